//! Web search through the DuckDuckGo HTML endpoint.

use super::{ContextSource, SourceLimits, USER_AGENT, http_agent, truncate_chars};
use crate::context::Lookup;
use crate::error::{Error, Result};
use percent_encoding::percent_decode_str;
use scraper::{Html, Selector};
use tracing::debug;

const NAME: &str = "Web Search";
const ENDPOINT: &str = "https://html.duckduckgo.com/html/";

/// A single search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SearchHit {
    title: String,
    url: String,
    snippet: String,
}

/// Searches the web and returns titles, URLs and snippets.
pub struct WebSearch {
    agent: ureq::Agent,
    limits: SourceLimits,
    timeout_secs: u64,
}

impl WebSearch {
    pub fn new(limits: SourceLimits, timeout_secs: u64) -> Self {
        Self {
            agent: http_agent(timeout_secs),
            limits,
            timeout_secs,
        }
    }
}

impl ContextSource for WebSearch {
    fn name(&self) -> &str {
        NAME
    }

    fn fetch(&self, query: &str) -> Result<Lookup> {
        let mut response = self
            .agent
            .post(ENDPOINT)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "text/html")
            .send_form([("q", query)])
            .map_err(|e| Error::from_http(NAME, self.timeout_secs, e))?;

        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| Error::from_http(NAME, self.timeout_secs, e))?;

        let hits = parse_results(&body, self.limits.max_results)?;
        debug!(query, hits = hits.len(), "Web search finished");

        let text = hits
            .iter()
            .map(|hit| format!("{}\n  {}\n  {}", hit.title, hit.url, hit.snippet))
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(Lookup::from_text(truncate_chars(&text, self.limits.max_chars)))
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::tool(NAME, format!("bad selector {}: {:?}", css, e)))
}

fn parse_results(html: &str, max_results: usize) -> Result<Vec<SearchHit>> {
    let doc = Html::parse_document(html);
    let result_sel = selector(".result")?;
    let link_sel = selector("a.result__a")?;
    let snippet_sel = selector(".result__snippet")?;

    let mut hits = Vec::new();
    for result in doc.select(&result_sel) {
        if hits.len() >= max_results {
            break;
        }

        let Some(link) = result.select(&link_sel).next() else {
            continue;
        };
        let title = link.text().collect::<String>().trim().to_string();
        if title.is_empty() {
            continue;
        }

        let url = decode_redirect(link.value().attr("href").unwrap_or(""));
        let snippet = result
            .select(&snippet_sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        hits.push(SearchHit {
            title,
            url,
            snippet,
        });
    }

    Ok(hits)
}

/// Result links come wrapped as `//duckduckgo.com/l/?uddg=<encoded>&rut=...`.
fn decode_redirect(href: &str) -> String {
    let Some(pos) = href.find("uddg=") else {
        return href.to_string();
    };
    let encoded = &href[pos + 5..];
    let encoded = encoded.split('&').next().unwrap_or(encoded);
    if encoded.is_empty() {
        return href.to_string();
    }
    percent_decode_str(encoded).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<html><body>
  <div class="result">
    <h2><a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fen.wikipedia.org%2Fwiki%2FEntropy&rut=abc">Entropy - Wikipedia</a></h2>
    <a class="result__snippet">Entropy is a scientific concept.</a>
  </div>
  <div class="result">
    <h2><a class="result__a" href="https://example.com/heat">Heat death</a></h2>
  </div>
  <div class="result">
    <h2><a class="result__a" href="https://example.com/third">Third</a></h2>
    <div class="result__snippet">Third snippet</div>
  </div>
</body></html>"#;

    #[test]
    fn test_parse_results() {
        let hits = parse_results(PAGE, 10).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].title, "Entropy - Wikipedia");
        assert_eq!(hits[0].url, "https://en.wikipedia.org/wiki/Entropy");
        assert_eq!(hits[0].snippet, "Entropy is a scientific concept.");
        assert_eq!(hits[1].snippet, "");
        assert_eq!(hits[2].snippet, "Third snippet");
    }

    #[test]
    fn test_parse_results_respects_limit() {
        let hits = parse_results(PAGE, 2).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_parse_results_empty_page() {
        assert!(parse_results("<html></html>", 5).unwrap().is_empty());
    }

    #[test]
    fn test_decode_redirect_passthrough() {
        assert_eq!(decode_redirect("https://example.com"), "https://example.com");
    }
}

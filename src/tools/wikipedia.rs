//! Wikipedia lookups through the MediaWiki Action API.

use super::{ContextSource, SourceLimits, USER_AGENT, http_agent, truncate_chars};
use crate::context::Lookup;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

const NAME: &str = "Wikipedia";
const ENDPOINT: &str = "https://en.wikipedia.org/w/api.php";

#[derive(Deserialize)]
struct SearchResponse {
    query: SearchQuery,
}

#[derive(Deserialize)]
struct SearchQuery {
    search: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Deserialize)]
struct ExtractResponse {
    query: Option<ExtractQuery>,
}

#[derive(Deserialize)]
struct ExtractQuery {
    #[serde(default)]
    pages: HashMap<String, ExtractPage>,
}

#[derive(Deserialize)]
struct ExtractPage {
    title: String,
    extract: Option<String>,
}

/// Searches Wikipedia and returns the lead section of the top pages.
pub struct Wikipedia {
    agent: ureq::Agent,
    limits: SourceLimits,
    timeout_secs: u64,
}

impl Wikipedia {
    pub fn new(limits: SourceLimits, timeout_secs: u64) -> Self {
        Self {
            agent: http_agent(timeout_secs),
            limits,
            timeout_secs,
        }
    }

    fn search_titles(&self, query: &str) -> Result<Vec<String>> {
        let limit = self.limits.max_results.to_string();
        let response: SearchResponse = self
            .agent
            .get(ENDPOINT)
            .header("User-Agent", USER_AGENT)
            .query("action", "query")
            .query("list", "search")
            .query("srsearch", query)
            .query("srlimit", &limit)
            .query("format", "json")
            .call()
            .and_then(|mut resp| resp.body_mut().read_json())
            .map_err(|e| Error::from_http(NAME, self.timeout_secs, e))?;

        Ok(response.query.search.into_iter().map(|hit| hit.title).collect())
    }

    fn page_summary(&self, title: &str) -> Result<Option<(String, String)>> {
        let response: ExtractResponse = self
            .agent
            .get(ENDPOINT)
            .header("User-Agent", USER_AGENT)
            .query("action", "query")
            .query("prop", "extracts")
            .query("exintro", "1")
            .query("explaintext", "1")
            .query("redirects", "1")
            .query("titles", title)
            .query("format", "json")
            .call()
            .and_then(|mut resp| resp.body_mut().read_json())
            .map_err(|e| Error::from_http(NAME, self.timeout_secs, e))?;

        Ok(response
            .query
            .and_then(|q| q.pages.into_values().next())
            .and_then(|page| {
                let extract = page.extract?.trim().to_string();
                (!extract.is_empty()).then_some((page.title, extract))
            }))
    }
}

impl ContextSource for Wikipedia {
    fn name(&self) -> &str {
        NAME
    }

    fn fetch(&self, query: &str) -> Result<Lookup> {
        let titles = self.search_titles(query)?;
        debug!(query, pages = titles.len(), "Wikipedia search finished");

        let pages = collect_pages(&titles, |title| self.page_summary(title))?;

        Ok(Lookup::from_text(truncate_chars(
            &pages.join("\n\n"),
            self.limits.max_chars,
        )))
    }
}

/// Load each page, skipping the ones whose request fails.
///
/// Errors only when every page failed.
fn collect_pages<F>(titles: &[String], mut page_summary: F) -> Result<Vec<String>>
where
    F: FnMut(&str) -> Result<Option<(String, String)>>,
{
    let mut pages = Vec::new();
    let mut last_error = None;

    for title in titles {
        match page_summary(title) {
            Ok(Some((title, summary))) => pages.push(format_page(&title, &summary)),
            Ok(None) => {}
            Err(e) => {
                warn!(%title, error = %e, "Skipping Wikipedia page");
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if pages.is_empty() => Err(e),
        _ => Ok(pages),
    }
}

fn format_page(title: &str, summary: &str) -> String {
    format!("Page: {}\nSummary: {}", title, summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_search() {
        let body = r#"{"batchcomplete":"","query":{"searchinfo":{"totalhits":2},"search":[{"ns":0,"title":"Entropy","pageid":9891},{"ns":0,"title":"Entropy (information theory)","pageid":15445}]}}"#;
        let response: SearchResponse = serde_json::from_str(body).unwrap();
        let titles: Vec<String> = response.query.search.into_iter().map(|h| h.title).collect();
        assert_eq!(titles, vec!["Entropy", "Entropy (information theory)"]);
    }

    #[test]
    fn test_deserialize_missing_page() {
        let body = r#"{"query":{"pages":{"-1":{"ns":0,"title":"Nope","missing":""}}}}"#;
        let response: ExtractResponse = serde_json::from_str(body).unwrap();
        let page = response.query.unwrap().pages.into_values().next().unwrap();
        assert_eq!(page.title, "Nope");
        assert!(page.extract.is_none());
    }

    #[test]
    fn test_format_page() {
        assert_eq!(
            format_page("Entropy", "A measure of disorder."),
            "Page: Entropy\nSummary: A measure of disorder."
        );
    }

    fn titles(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_collect_pages_skips_failed_page() {
        let pages = collect_pages(&titles(&["Entropy", "Broken", "Heat death"]), |title| {
            match title {
                "Broken" => Err(Error::tool(NAME, "HTTP error 500")),
                t => Ok(Some((t.to_string(), format!("About {}.", t)))),
            }
        })
        .unwrap();

        assert_eq!(
            pages,
            vec![
                "Page: Entropy\nSummary: About Entropy.",
                "Page: Heat death\nSummary: About Heat death."
            ]
        );
    }

    #[test]
    fn test_collect_pages_errors_when_every_page_fails() {
        let result = collect_pages(&titles(&["A", "B"]), |_| {
            Err(Error::Timeout {
                operation: NAME.to_string(),
                secs: 5,
            })
        });
        assert!(result.unwrap_err().is_timeout());

        let empty = collect_pages(&titles(&["Missing"]), |_| Ok(None)).unwrap();
        assert!(empty.is_empty());
    }
}

//! Research tools: the context sources and the save tool.
//!
//! Web search and Wikipedia share the [`ContextSource`] contract, so the
//! assistant can fetch both the same way and tests can swap in fakes.

mod save;
mod search;
mod wikipedia;

pub use save::{DEFAULT_OUTPUT_PATH, SaveTool};
pub use search::WebSearch;
pub use wikipedia::Wikipedia;

use crate::context::Lookup;
use crate::error::Result;
use std::time::Duration;

/// Sent with every tool request; some endpoints reject requests without one.
const USER_AGENT: &str = concat!("cosmic-query/", env!("CARGO_PKG_VERSION"));

/// A tool that turns a query into grounding text.
pub trait ContextSource: Send + Sync {
    /// Tool name, as reported in `tools_used`.
    fn name(&self) -> &str;

    /// Look the query up. `Ok(Lookup::NoResults)` when nothing matched,
    /// `Err` when the tool itself failed.
    fn fetch(&self, query: &str) -> Result<Lookup>;

    /// Text for the query, empty when the lookup found nothing or failed.
    fn run(&self, query: &str) -> String {
        match self.fetch(query) {
            Ok(lookup) => lookup.text().to_string(),
            Err(_) => String::new(),
        }
    }
}

/// How much a single source may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLimits {
    /// Maximum number of results/pages
    pub max_results: usize,
    /// Maximum characters of text
    pub max_chars: usize,
}

impl SourceLimits {
    pub fn new(max_results: usize, max_chars: usize) -> Self {
        Self {
            max_results,
            max_chars,
        }
    }
}

/// Limits for both context sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolsConfig {
    pub wiki: SourceLimits,
    pub search: SourceLimits,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self::compact()
    }
}

impl ToolsConfig {
    /// 3 results / 4000 characters per source.
    pub fn compact() -> Self {
        Self {
            wiki: SourceLimits::new(3, 4000),
            search: SourceLimits::new(3, 4000),
        }
    }

    /// 7 results / 12000 characters per source.
    pub fn extended() -> Self {
        Self {
            wiki: SourceLimits::new(7, 12000),
            search: SourceLimits::new(7, 12000),
        }
    }
}

/// HTTP agent whose calls all give up after `timeout_secs`.
pub(crate) fn http_agent(timeout_secs: u64) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(timeout_secs)))
        .build();
    config.into()
}

/// Keep at most `max_chars` characters.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct Flaky;

    impl ContextSource for Flaky {
        fn name(&self) -> &str {
            "Flaky"
        }

        fn fetch(&self, _query: &str) -> Result<Lookup> {
            Err(Error::tool("Flaky", "connection reset"))
        }
    }

    #[test]
    fn test_run_collapses_failure_to_empty_text() {
        assert_eq!(Flaky.run("anything"), "");
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("entropía", 7), "entropí");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_presets() {
        assert_eq!(ToolsConfig::default(), ToolsConfig::compact());
        assert_eq!(ToolsConfig::extended().wiki, SourceLimits::new(7, 12000));
    }
}

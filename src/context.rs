//! The research query and the grounding material gathered for it.
//!
//! Each tool lookup ends in a [`Lookup`], which keeps "the tool failed" apart
//! from "the tool found nothing". The prompt only ever sees text: both of
//! those cases turn into an empty string there.

use crate::error::{Error, Result};
use std::fmt;

/// A research topic: trimmed and never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchQuery(String);

impl ResearchQuery {
    pub fn new(topic: &str) -> Result<Self> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(Error::EmptyTopic);
        }
        Ok(Self(topic.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the topic asks for the result to be saved (batch mode convention).
    pub fn requests_save(&self) -> bool {
        self.0.to_lowercase().contains("save")
    }
}

impl fmt::Display for ResearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a single tool lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The tool returned text
    Found(String),
    /// The tool ran but had nothing for the query
    NoResults,
    /// The tool call failed
    Failed(String),
    /// The tool call exceeded its timeout
    TimedOut(String),
}

impl Lookup {
    /// Text to embed in the prompt.
    pub fn text(&self) -> &str {
        match self {
            Lookup::Found(text) => text,
            Lookup::NoResults | Lookup::Failed(_) | Lookup::TimedOut(_) => "",
        }
    }

    /// Whether the tool call failed, timeouts included.
    pub fn is_failed(&self) -> bool {
        matches!(self, Lookup::Failed(_) | Lookup::TimedOut(_))
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, Lookup::TimedOut(_))
    }

    /// Record a failed tool call, keeping timeouts apart from other errors.
    pub fn from_error(err: &Error) -> Self {
        if err.is_timeout() {
            Lookup::TimedOut(err.to_string())
        } else {
            Lookup::Failed(err.to_string())
        }
    }

    /// Wrap raw tool text, treating blank output as no results.
    pub fn from_text(text: String) -> Self {
        if text.trim().is_empty() {
            Lookup::NoResults
        } else {
            Lookup::Found(text)
        }
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Found(text) => write!(f, "{} chars", text.chars().count()),
            Lookup::NoResults => f.write_str("no results"),
            Lookup::Failed(reason) => write!(f, "failed: {}", reason),
            Lookup::TimedOut(reason) => f.write_str(reason),
        }
    }
}

/// The two context blobs fed into the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBundle {
    pub wiki: Lookup,
    pub search: Lookup,
}

impl ContextBundle {
    pub fn new(wiki: Lookup, search: Lookup) -> Self {
        Self { wiki, search }
    }

    pub fn wiki_context(&self) -> &str {
        self.wiki.text()
    }

    pub fn search_context(&self) -> &str {
        self.search.text()
    }

    /// Whether neither tool produced any text.
    pub fn is_empty(&self) -> bool {
        self.wiki_context().is_empty() && self.search_context().is_empty()
    }
}

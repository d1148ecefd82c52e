//! Persisting research output to disk.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// File the research output goes to unless configured otherwise.
pub const DEFAULT_OUTPUT_PATH: &str = "research_output.txt";

/// Writes research output to a single file, replacing what was there.
#[derive(Debug, Clone)]
pub struct SaveTool {
    path: PathBuf,
}

impl Default for SaveTool {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_PATH)
    }
}

impl SaveTool {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the output file with `content`.
    pub fn save(&self, content: &str) -> Result<String> {
        std::fs::write(&self.path, content).map_err(|source| Error::Persistence {
            path: self.path.clone(),
            source,
        })?;
        info!(path = %self.path.display(), bytes = content.len(), "Saved research output");
        Ok(format!("Saved to {}", self.path.display()))
    }
}

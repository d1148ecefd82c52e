//! Terminal rendering of research results.
//!
//! Output is Markdown-flavoured text. Every `**bold**` span in the summary is
//! turned into a `###` heading, section title or not; this is a plain text
//! substitution, not a Markdown parser.

use crate::error::Result;
use crate::recovery::{RecoveryFailure, RecoveryOutcome, RecoveryPipeline};
use crate::schema::{Field, PartialResponse};
use crate::tools::SaveTool;
use regex::Regex;
use std::fmt::Write;

/// A rendered outcome and, when saving was requested, how it went.
#[derive(Debug)]
pub struct Presentation {
    pub view: String,
    /// `None` when nothing was saved
    pub saved: Option<Result<String>>,
}

impl Presentation {
    /// One-line status of the save, if one was attempted.
    pub fn notice(&self) -> Option<String> {
        match &self.saved {
            Some(Ok(status)) => Some(status.clone()),
            Some(Err(e)) => Some(format!("Could not save research output: {}", e)),
            None => None,
        }
    }
}

/// Renders outcomes and saves them on request.
pub struct Presenter {
    recovery: RecoveryPipeline,
    save_tool: SaveTool,
    bold_regex: Regex,
    blank_lines_regex: Regex,
}

impl Presenter {
    pub fn new(save_tool: SaveTool) -> Self {
        Self {
            recovery: RecoveryPipeline::new(),
            save_tool,
            bold_regex: Regex::new(r"\*\*(.*?)\*\*").unwrap(),
            blank_lines_regex: Regex::new(r"\n{3,}").unwrap(),
        }
    }

    pub fn save_tool(&self) -> &SaveTool {
        &self.save_tool
    }

    /// Render the outcome, then save it if asked and there is anything to save.
    ///
    /// A failed save never affects the rendered view.
    pub fn present(&self, outcome: &RecoveryOutcome, save: bool) -> Presentation {
        let view = self.render(outcome);
        let saved = if save { self.save(outcome) } else { None };
        Presentation { view, saved }
    }

    /// Save the recovered fields as 4-space-indented JSON.
    ///
    /// Returns `None` when the outcome holds nothing to save.
    pub fn save(&self, outcome: &RecoveryOutcome) -> Option<Result<String>> {
        let json = outcome.to_saved_json()?;
        Some(self.save_tool.save(&json))
    }

    pub fn render(&self, outcome: &RecoveryOutcome) -> String {
        match outcome {
            RecoveryOutcome::Full { response, .. } => {
                self.render_result(&PartialResponse::from(response.clone()), None)
            }
            RecoveryOutcome::Degraded { partial, stage, .. } => {
                let missing: Vec<Field> = partial.missing_fields();
                let note = format!(
                    "> Partial result (recovered by {}); missing: {}",
                    stage,
                    missing
                        .iter()
                        .map(|f| f.key())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                self.render_result(partial, Some(note))
            }
            RecoveryOutcome::Failed(failure) => self.render_failure(failure),
        }
    }

    fn render_result(&self, result: &PartialResponse, note: Option<String>) -> String {
        let mut out = String::new();

        if let Some(note) = note {
            let _ = writeln!(out, "{}\n", note);
        }

        let _ = writeln!(out, "## Topic\n");
        let _ = writeln!(out, "**{}**\n", result.topic());

        let _ = writeln!(out, "## Detailed Summary\n");
        let summary = self.format_summary(result.summary());
        if !summary.is_empty() {
            let _ = writeln!(out, "{}\n", summary);
        }

        let _ = writeln!(out, "## Sources\n");
        for source in result.sources() {
            let _ = writeln!(out, "- {}", source);
        }
        if !result.sources().is_empty() {
            out.push('\n');
        }

        let _ = writeln!(out, "## Tools Used\n");
        for row in tool_rows(result.tools_used()) {
            let _ = writeln!(out, "{}", row);
        }

        out.trim_end().to_string()
    }

    fn render_failure(&self, failure: &RecoveryFailure) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "Failed to parse model output\n");
        let _ = writeln!(out, "**Error details:**\n{}\n", failure.report());

        if let Some(summary) = self.recovery.extract_summary(&failure.raw) {
            let _ = writeln!(out, "## Extracted Summary Content\n\n{}\n", summary);
        }

        let _ = writeln!(out, "----- raw output -----");
        let _ = writeln!(out, "{}", failure.raw);
        let _ = write!(out, "----- end raw output -----");
        out
    }

    /// Prepare a summary for display: undo double-escaped newlines and turn
    /// every bold span into a heading.
    pub fn format_summary(&self, summary: &str) -> String {
        let text = if summary.contains("\\n") {
            summary.replace("\\n\\n", "\n\n").replace("\\n", "\n")
        } else {
            summary.to_string()
        };

        let text = self.bold_regex.replace_all(&text, "\n\n### $1\n\n");
        self.blank_lines_regex
            .replace_all(&text, "\n\n")
            .trim()
            .to_string()
    }
}

/// Lay tools out in two columns: even indices left, odd indices right.
pub fn tool_rows(tools: &[String]) -> Vec<String> {
    let left: Vec<&String> = tools.iter().step_by(2).collect();
    let right: Vec<&String> = tools.iter().skip(1).step_by(2).collect();
    let width = left.iter().map(|t| t.chars().count()).max().unwrap_or(0) + 2;

    left.iter()
        .enumerate()
        .map(|(i, l)| match right.get(i) {
            Some(r) => format!("{:<width$}  - {}", format!("- {}", l), r, width = width),
            None => format!("- {}", l),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::{Stage, StageError, StageFailure};
    use crate::schema::ResearchResponse;

    fn presenter() -> Presenter {
        Presenter::new(SaveTool::default())
    }

    #[test]
    fn test_format_summary_bold_to_heading() {
        let text = presenter().format_summary("**Intro**\n\nText with **emphasis** inside.");
        assert_eq!(
            text,
            "### Intro\n\nText with \n\n### emphasis\n\n inside."
        );
    }

    #[test]
    fn test_format_summary_double_escaped_newlines() {
        let text = presenter().format_summary(r"**Intro**\n\nText.\nMore.");
        assert_eq!(text, "### Intro\n\nText.\nMore.");
    }

    #[test]
    fn test_tool_rows_by_parity() {
        let tools: Vec<String> = ["Wikipedia", "Web Search", "Save"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let rows = tool_rows(&tools);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], "- Wikipedia  - Web Search");
        assert_eq!(rows[1], "- Save");
        assert!(tool_rows(&[]).is_empty());
    }

    #[test]
    fn test_render_full() {
        let outcome = RecoveryOutcome::Full {
            response: ResearchResponse {
                topic: "Entropy".to_string(),
                summary: "**Intro**\n\nText.".to_string(),
                sources: vec!["Wikipedia: Entropy".to_string()],
                tools_used: vec!["Wikipedia".to_string()],
            },
            stage: Stage::DirectParse,
            attempts: vec![],
        };
        let view = presenter().render(&outcome);

        assert!(view.starts_with("## Topic\n\n**Entropy**"));
        let heading = view.find("### Intro").unwrap();
        let body = view.find("Text.").unwrap();
        assert!(heading < body);
        assert!(view.contains("## Sources\n\n- Wikipedia: Entropy\n"));
        assert!(view.ends_with("## Tools Used\n\n- Wikipedia"));
    }

    #[test]
    fn test_render_degraded_shows_empty_sections() {
        let outcome = RecoveryOutcome::Degraded {
            partial: PartialResponse::summary_only("Only this."),
            stage: Stage::FieldExtraction,
            attempts: vec![],
        };
        let view = presenter().render(&outcome);

        assert!(view.starts_with(
            "> Partial result (recovered by field extraction); missing: topic, sources, tools_used"
        ));
        assert!(view.contains("**Research Topic**"));
        assert!(view.contains("Only this."));
        assert!(view.contains("## Sources\n\n## Tools Used"));
    }

    #[test]
    fn test_render_failure_shows_raw_text() {
        let outcome = RecoveryOutcome::Failed(RecoveryFailure {
            raw: "Sorry, I cannot comply.".to_string(),
            attempts: vec![StageFailure {
                stage: Stage::FieldExtraction,
                error: StageError::NotFound("no \"summary\" field in reply"),
            }],
        });
        let view = presenter().render(&outcome);

        assert!(view.starts_with("Failed to parse model output"));
        assert!(view.contains("field extraction: not found"));
        assert!(!view.contains("Extracted Summary Content"));
        assert!(view.ends_with(
            "----- raw output -----\nSorry, I cannot comply.\n----- end raw output -----"
        ));
    }

    #[test]
    fn test_present_without_save_request() {
        let outcome = RecoveryOutcome::Degraded {
            partial: PartialResponse::summary_only("x"),
            stage: Stage::FieldExtraction,
            attempts: vec![],
        };
        let presentation = presenter().present(&outcome, false);
        assert!(presentation.saved.is_none());
        assert!(presentation.notice().is_none());
    }

    #[test]
    fn test_present_failure_saves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let presenter = Presenter::new(SaveTool::new(&path));

        let outcome = RecoveryOutcome::Failed(RecoveryFailure {
            raw: "nope".to_string(),
            attempts: vec![],
        });
        let presentation = presenter.present(&outcome, true);

        assert!(presentation.saved.is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_save_failure_keeps_view() {
        let dir = tempfile::tempdir().unwrap();
        let presenter = Presenter::new(SaveTool::new(dir.path().join("no/such/dir.txt")));

        let outcome = RecoveryOutcome::Degraded {
            partial: PartialResponse::summary_only("Body"),
            stage: Stage::FieldExtraction,
            attempts: vec![],
        };
        let presentation = presenter.present(&outcome, true);

        assert!(presentation.view.contains("Body"));
        assert!(presentation.notice().unwrap().starts_with("Could not save"));
    }
}

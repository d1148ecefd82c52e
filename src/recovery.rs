//! Recovery of a typed research result from a raw model reply.
//!
//! Model replies are meant to be a bare JSON object but routinely arrive
//! wrapped in a code fence, with raw newlines inside strings, with trailing
//! commas, or as plain prose. The pipeline strips fencing and then walks an
//! ordered cascade of [`Stage`]s, stopping at the first one that succeeds:
//!
//! 1. [`Stage::DirectParse`] - strict JSON parse; missing keys are tolerated
//!    and reported as a degraded result.
//! 2. [`Stage::SchemaReparse`] - isolate the outermost object, repair common
//!    formatting slips and validate against the result JSON Schema.
//! 3. [`Stage::FieldExtraction`] - scrape the `"summary"` string out of the
//!    raw text with a regex.
//!
//! Every failed stage is kept so a final report can show what was tried.

use crate::schema::{Field, PartialResponse, ResearchResponse, response_schema, to_pretty_json};
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, warn};

/// A step of the recovery cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    DirectParse,
    SchemaReparse,
    FieldExtraction,
}

impl Stage {
    /// Cascade order, strictest first.
    pub const CASCADE: [Stage; 3] = [
        Stage::DirectParse,
        Stage::SchemaReparse,
        Stage::FieldExtraction,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::DirectParse => "direct parse",
            Stage::SchemaReparse => "schema-guided reparse",
            Stage::FieldExtraction => "field extraction",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a stage could not recover a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    /// The text is not valid JSON
    Decode(String),
    /// The JSON does not have the shape of a research result
    Schema(String),
    /// Nothing usable was found
    NotFound(&'static str),
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageError::Decode(msg) => write!(f, "decode error: {}", msg),
            StageError::Schema(msg) => write!(f, "schema violation: {}", msg),
            StageError::NotFound(what) => write!(f, "not found: {}", what),
        }
    }
}

/// A failed stage and its reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: StageError,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.error)
    }
}

/// Every stage failed; the raw reply is kept for manual inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryFailure {
    pub raw: String,
    pub attempts: Vec<StageFailure>,
}

impl RecoveryFailure {
    /// One line per attempted stage.
    pub fn report(&self) -> String {
        self.attempts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Result of running the recovery cascade over one reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// All four fields recovered and typed
    Full {
        response: ResearchResponse,
        stage: Stage,
        attempts: Vec<StageFailure>,
    },
    /// Some fields recovered, the rest are absent
    Degraded {
        partial: PartialResponse,
        stage: Stage,
        attempts: Vec<StageFailure>,
    },
    /// Nothing could be recovered
    Failed(RecoveryFailure),
}

impl RecoveryOutcome {
    /// The stage that produced the result, if any did.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            RecoveryOutcome::Full { stage, .. } | RecoveryOutcome::Degraded { stage, .. } => {
                Some(*stage)
            }
            RecoveryOutcome::Failed(_) => None,
        }
    }

    /// Stages that failed before the outcome was reached.
    pub fn attempts(&self) -> &[StageFailure] {
        match self {
            RecoveryOutcome::Full { attempts, .. } | RecoveryOutcome::Degraded { attempts, .. } => {
                attempts
            }
            RecoveryOutcome::Failed(failure) => &failure.attempts,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, RecoveryOutcome::Full { .. })
    }

    /// The recovered fields, or `None` on failure.
    pub fn recovered(&self) -> Option<PartialResponse> {
        match self {
            RecoveryOutcome::Full { response, .. } => Some(response.clone().into()),
            RecoveryOutcome::Degraded { partial, .. } => Some(partial.clone()),
            RecoveryOutcome::Failed(_) => None,
        }
    }

    /// 4-space-indented JSON of the result, as written to disk.
    ///
    /// Degraded results are written with their defaults filled in, so the
    /// file always carries all four fields.
    pub fn to_saved_json(&self) -> Option<String> {
        match self {
            RecoveryOutcome::Full { response, .. } => to_pretty_json(response).ok(),
            RecoveryOutcome::Degraded { partial, .. } => {
                to_pretty_json(&partial.clone().into_response()).ok()
            }
            RecoveryOutcome::Failed(_) => None,
        }
    }
}

/// What a successful stage produced.
enum Recovered {
    Full(ResearchResponse),
    Partial(PartialResponse),
}

/// The reply in both forms the stages work on.
struct Reply<'a> {
    raw: &'a str,
    stripped: &'a str,
}

/// Remove a surrounding Markdown code fence (```` ```json ```` or bare
/// ```` ``` ````) and the whitespace around it.
pub fn strip_fencing(raw: &str) -> &str {
    let text = raw.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    let text = text.trim_end();
    text.strip_suffix("```").unwrap_or(text).trim()
}

/// Runs the recovery cascade.
pub struct RecoveryPipeline {
    validator: jsonschema::Validator,
    summary_regex: Regex,
}

impl Default for RecoveryPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl RecoveryPipeline {
    pub fn new() -> Self {
        Self {
            validator: jsonschema::validator_for(&response_schema()).unwrap(),
            // "summary": "...", honoring escaped quotes, spanning newlines
            summary_regex: Regex::new(r#"(?s)"summary"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap(),
        }
    }

    /// Recover a research result from a raw model reply.
    pub fn recover(&self, raw: &str) -> RecoveryOutcome {
        let reply = Reply {
            raw,
            stripped: strip_fencing(raw),
        };

        let mut attempts = Vec::new();
        for stage in Stage::CASCADE {
            match self.attempt(stage, &reply) {
                Ok(Recovered::Full(response)) => {
                    debug!(%stage, "Recovered full result");
                    return RecoveryOutcome::Full {
                        response,
                        stage,
                        attempts,
                    };
                }
                Ok(Recovered::Partial(partial)) => {
                    debug!(%stage, missing = ?partial.missing_fields(), "Recovered partial result");
                    return RecoveryOutcome::Degraded {
                        partial,
                        stage,
                        attempts,
                    };
                }
                Err(error) => {
                    debug!(%stage, %error, "Recovery stage failed");
                    attempts.push(StageFailure { stage, error });
                }
            }
        }

        warn!(stages = attempts.len(), "Could not recover a result from the model reply");
        RecoveryOutcome::Failed(RecoveryFailure {
            raw: raw.to_string(),
            attempts,
        })
    }

    /// Pull just the summary string out of arbitrary text.
    pub fn extract_summary(&self, text: &str) -> Option<String> {
        self.summary_regex
            .captures(text)
            .and_then(|cap| cap.get(1))
            .map(|m| unescape_json_string(m.as_str()))
    }

    fn attempt(&self, stage: Stage, reply: &Reply<'_>) -> Result<Recovered, StageError> {
        match stage {
            Stage::DirectParse => direct_parse(reply.stripped),
            Stage::SchemaReparse => self.schema_reparse(reply.stripped),
            Stage::FieldExtraction => self
                .extract_summary(reply.raw)
                .map(|summary| Recovered::Partial(PartialResponse::summary_only(summary)))
                .ok_or(StageError::NotFound("no \"summary\" field in reply")),
        }
    }

    fn schema_reparse(&self, text: &str) -> Result<Recovered, StageError> {
        let span = outermost_object(text).ok_or(StageError::NotFound("no JSON object in reply"))?;
        let repaired = repair_json(span);
        let value: Value =
            serde_json::from_str(&repaired).map_err(|e| StageError::Decode(e.to_string()))?;

        let violations: Vec<String> = self
            .validator
            .iter_errors(&value)
            .map(|e| e.to_string())
            .collect();
        if !violations.is_empty() {
            return Err(StageError::Schema(violations.join("; ")));
        }

        serde_json::from_value(value)
            .map(Recovered::Full)
            .map_err(|e| StageError::Schema(e.to_string()))
    }
}

fn direct_parse(text: &str) -> Result<Recovered, StageError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| StageError::Decode(e.to_string()))?;
    let map = match value {
        Value::Object(map) => map,
        other => {
            return Err(StageError::Schema(format!(
                "expected a JSON object, found {}",
                kind(&other)
            )));
        }
    };

    let partial = PartialResponse {
        topic: string_field(&map, Field::Topic)?,
        summary: string_field(&map, Field::Summary)?,
        sources: list_field(&map, Field::Sources)?,
        tools_used: list_field(&map, Field::ToolsUsed)?,
    };

    Ok(match partial.complete() {
        Ok(response) => Recovered::Full(response),
        Err(partial) => Recovered::Partial(partial),
    })
}

fn string_field(map: &Map<String, Value>, field: Field) -> Result<Option<String>, StageError> {
    match map.get(field.key()) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(StageError::Schema(format!(
            "`{}` must be a string, found {}",
            field,
            kind(other)
        ))),
    }
}

fn list_field(map: &Map<String, Value>, field: Field) -> Result<Option<Vec<String>>, StageError> {
    let items = match map.get(field.key()) {
        None => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(StageError::Schema(format!(
                "`{}` must be an array of strings, found {}",
                field,
                kind(other)
            )));
        }
    };

    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            other => Err(StageError::Schema(format!(
                "`{}` items must be strings, found {}",
                field,
                kind(other)
            ))),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Slice from the first `{` to the last `}`.
fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Fix the formatting slips models commonly make: raw control characters
/// inside strings, invalid escapes such as `\'`, and trailing commas before a
/// closing bracket.
fn repair_json(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(c);
                continue;
            }
            match c {
                '\\' if is_valid_escape(&chars[i + 1..]) => {
                    escaped = true;
                    out.push(c);
                }
                // Invalid escape: drop the backslash, keep the character
                '\\' => {}
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
                c => out.push(c),
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            c => out.push(c),
        }
    }

    out
}

/// Whether the text after a backslash forms a valid JSON escape.
fn is_valid_escape(rest: &[char]) -> bool {
    match rest.first() {
        Some('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't') => true,
        Some('u') => rest.len() >= 5 && rest[1..5].iter().all(|c| c.is_ascii_hexdigit()),
        _ => false,
    }
}

/// Resolve JSON string escapes. An unknown escape resolves to the escaped
/// character; a malformed `\u` escape is kept verbatim.
fn unescape_json_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('u') => match read_hex4(&mut chars) {
                Some(high @ 0xD800..=0xDBFF) => {
                    let mut lookahead = chars.clone();
                    let low = match (lookahead.next(), lookahead.next()) {
                        (Some('\\'), Some('u')) => read_hex4(&mut lookahead),
                        _ => None,
                    };
                    match low {
                        Some(low @ 0xDC00..=0xDFFF) => {
                            let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                            out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
                            chars = lookahead;
                        }
                        _ => out.push(char::REPLACEMENT_CHARACTER),
                    }
                }
                Some(code) => out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER)),
                None => out.push_str("\\u"),
            },
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }

    out
}

/// Consume four hex digits, leaving the iterator untouched if there aren't any.
fn read_hex4(chars: &mut std::str::Chars<'_>) -> Option<u32> {
    let hex: String = chars.clone().take(4).collect();
    if hex.len() != 4 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    chars.nth(3);
    u32::from_str_radix(&hex, 16).ok()
}

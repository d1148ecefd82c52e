//! The research result contract.
//!
//! [`ResearchResponse`] is what every successful run produces. When the model
//! reply only partly matches, the recovery pipeline yields a
//! [`PartialResponse`] instead, where an absent field stays visibly absent.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

/// Topic shown when the reply did not carry one.
pub const DEFAULT_TOPIC: &str = "Research Topic";

/// A fully recovered research result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchResponse {
    pub topic: String,
    pub summary: String,
    pub sources: Vec<String>,
    pub tools_used: Vec<String>,
}

/// The four fields of the result contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Topic,
    Summary,
    Sources,
    ToolsUsed,
}

impl Field {
    pub const ALL: [Field; 4] = [Field::Topic, Field::Summary, Field::Sources, Field::ToolsUsed];

    /// JSON key of the field.
    pub fn key(self) -> &'static str {
        match self {
            Field::Topic => "topic",
            Field::Summary => "summary",
            Field::Sources => "sources",
            Field::ToolsUsed => "tools_used",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A degraded result: fields that were not recovered are `None`.
///
/// Accessors fall back to the documented defaults so the result can still be
/// displayed; [`PartialResponse::missing_fields`] tells which ones did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools_used: Option<Vec<String>>,
}

impl PartialResponse {
    /// A partial result holding nothing but a summary.
    pub fn summary_only(summary: impl Into<String>) -> Self {
        Self {
            summary: Some(summary.into()),
            ..Default::default()
        }
    }

    pub fn topic(&self) -> &str {
        self.topic.as_deref().unwrap_or(DEFAULT_TOPIC)
    }

    pub fn summary(&self) -> &str {
        self.summary.as_deref().unwrap_or("")
    }

    pub fn sources(&self) -> &[String] {
        self.sources.as_deref().unwrap_or(&[])
    }

    pub fn tools_used(&self) -> &[String] {
        self.tools_used.as_deref().unwrap_or(&[])
    }

    /// Fields that were absent and are being defaulted.
    pub fn missing_fields(&self) -> Vec<Field> {
        Field::ALL
            .into_iter()
            .filter(|field| match field {
                Field::Topic => self.topic.is_none(),
                Field::Summary => self.summary.is_none(),
                Field::Sources => self.sources.is_none(),
                Field::ToolsUsed => self.tools_used.is_none(),
            })
            .collect()
    }

    /// Promote to a full result if every field is present.
    pub fn complete(self) -> Result<ResearchResponse, Self> {
        match self {
            PartialResponse {
                topic: Some(topic),
                summary: Some(summary),
                sources: Some(sources),
                tools_used: Some(tools_used),
            } => Ok(ResearchResponse {
                topic,
                summary,
                sources,
                tools_used,
            }),
            partial => Err(partial),
        }
    }

    /// Fill the missing fields with their defaults.
    pub fn into_response(self) -> ResearchResponse {
        ResearchResponse {
            topic: self.topic.unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
            summary: self.summary.unwrap_or_default(),
            sources: self.sources.unwrap_or_default(),
            tools_used: self.tools_used.unwrap_or_default(),
        }
    }
}

impl From<ResearchResponse> for PartialResponse {
    fn from(response: ResearchResponse) -> Self {
        Self {
            topic: Some(response.topic),
            summary: Some(response.summary),
            sources: Some(response.sources),
            tools_used: Some(response.tools_used),
        }
    }
}

/// JSON Schema of [`ResearchResponse`], used to validate leniently parsed replies.
pub fn response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "topic": { "type": "string" },
            "summary": { "type": "string" },
            "sources": { "type": "array", "items": { "type": "string" } },
            "tools_used": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["topic", "summary", "sources", "tools_used"]
    })
}

/// Serialize with the 4-space indentation used for the saved research file.
pub fn to_pretty_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    // serde_json only ever writes valid UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

//! Chat model client.
//!
//! The assistant only needs one thing from a model: send a system and a human
//! turn, get text back. [`ChatModel`] captures that, and [`GroqClient`] talks
//! to any OpenAI-compatible chat completions endpoint (Groq by default).

use crate::error::{Error, Result};
use crate::tools::http_agent;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Message role in a chat request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A message in a chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A single chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// A model that answers a chat request with text.
pub trait ChatModel: Send + Sync {
    fn complete(&self, request: &ChatRequest) -> Result<String>;
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat completions endpoint.
pub struct GroqClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
    timeout_secs: u64,
}

impl GroqClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            agent: http_agent(timeout_secs),
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout_secs,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl ChatModel for GroqClient {
    fn complete(&self, request: &ChatRequest) -> Result<String> {
        debug!(model = %request.model, messages = request.messages.len(), "Sending chat request");

        let response: ChatResponse = self
            .agent
            .post(&self.endpoint())
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .send_json(request)
            .and_then(|mut resp| resp.body_mut().read_json())
            .map_err(|e| model_error(e, self.timeout_secs))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::Model("response contained no message".to_string()))
    }
}

/// Map a ureq error from the chat endpoint. Timeouts stay distinct.
fn model_error(err: ureq::Error, timeout_secs: u64) -> Error {
    match err {
        ureq::Error::Timeout(_) => Error::Timeout {
            operation: "Model request".to_string(),
            secs: timeout_secs,
        },
        ureq::Error::StatusCode(401) => Error::Model("authentication failed".to_string()),
        ureq::Error::StatusCode(429) => Error::Model("rate limited".to_string()),
        ureq::Error::StatusCode(code) => Error::Model(format!("HTTP error {}", code)),
        other => Error::Model(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: "llama-3.1-8b-instant".to_string(),
            messages: vec![Message::system("sys"), Message::user("hi")],
            temperature: Some(0.5),
            max_tokens: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "llama-3.1-8b-instant",
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "hi"}
                ],
                "temperature": 0.5
            })
        );
    }

    #[test]
    fn test_response_deserialization() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"{\"topic\":\"T\"}"},"finish_reason":"stop"}]}"#;
        let response: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            response.choices[0].message.content.as_deref(),
            Some("{\"topic\":\"T\"}")
        );
    }

    #[test]
    fn test_endpoint_trims_slash() {
        let client = GroqClient::new("https://api.groq.com/openai/v1/", "key", 5);
        assert_eq!(
            client.endpoint(),
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }

    #[test]
    fn test_model_error_mapping() {
        let err = model_error(ureq::Error::Timeout(ureq::Timeout::Global), 30);
        assert!(err.is_timeout());
        assert!(matches!(err, Error::Timeout { secs: 30, .. }));

        let err = model_error(ureq::Error::StatusCode(401), 30);
        assert!(matches!(err, Error::Model(ref m) if m == "authentication failed"));

        let err = model_error(ureq::Error::StatusCode(429), 30);
        assert!(matches!(err, Error::Model(ref m) if m == "rate limited"));
        assert!(!err.is_timeout());

        let err = model_error(ureq::Error::StatusCode(500), 30);
        assert_eq!(err.to_string(), "Model error: HTTP error 500");
    }
}

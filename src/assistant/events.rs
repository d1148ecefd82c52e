//! Assistant events and callbacks for observability.

use crate::context::Lookup;
use crate::recovery::{Stage, StageFailure};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Events emitted while researching a topic.
#[derive(Debug, Clone)]
pub enum ResearchEvent {
    /// A context source finished
    ContextFetched { tool: String, lookup: Lookup },
    /// About to call the model
    ModelRequest { model: String },
    /// The model replied
    ModelResponse { content: String },
    /// A recovery stage failed
    StageFailed { failure: StageFailure },
    /// The reply was recovered by a stage
    Recovered { stage: Stage, full: bool },
    /// Every recovery stage failed
    RecoveryFailed { attempts: usize },
    /// An error occurred
    Error { message: String },
}

/// Type alias for event callbacks
pub type EventCallback = Arc<dyn Fn(&ResearchEvent) + Send + Sync>;

/// Storage for assistant callbacks
#[derive(Default, Clone)]
pub struct ResearchCallbacks {
    pub on_context_fetched: Option<EventCallback>,
    pub on_model_request: Option<EventCallback>,
    pub on_model_response: Option<EventCallback>,
    pub on_stage_failed: Option<EventCallback>,
    pub on_recovered: Option<EventCallback>,
    pub on_recovery_failed: Option<EventCallback>,
    pub on_error: Option<EventCallback>,
    /// Catch-all callback for any event
    pub on_event: Option<EventCallback>,
    /// Captured events, for inspection after a run
    pub(crate) captured_events: Option<Arc<Mutex<Vec<ResearchEvent>>>>,
}

impl ResearchCallbacks {
    /// Emit an event to the appropriate callback(s)
    pub fn emit(&self, event: &ResearchEvent) {
        if let Some(ref events) = self.captured_events
            && let Ok(mut events) = events.lock()
        {
            events.push(event.clone());
        }

        let specific = match event {
            ResearchEvent::ContextFetched { .. } => &self.on_context_fetched,
            ResearchEvent::ModelRequest { .. } => &self.on_model_request,
            ResearchEvent::ModelResponse { .. } => &self.on_model_response,
            ResearchEvent::StageFailed { .. } => &self.on_stage_failed,
            ResearchEvent::Recovered { .. } => &self.on_recovered,
            ResearchEvent::RecoveryFailed { .. } => &self.on_recovery_failed,
            ResearchEvent::Error { .. } => &self.on_error,
        };

        if let Some(cb) = specific {
            cb(event);
        }

        if let Some(cb) = &self.on_event {
            cb(event);
        }
    }
}

/// Callbacks that forward every event to `tracing`.
pub fn verbose_callbacks() -> ResearchCallbacks {
    ResearchCallbacks {
        on_event: Some(Arc::new(|e| match e {
            ResearchEvent::ContextFetched { tool, lookup } => {
                if lookup.is_failed() {
                    warn!(%tool, %lookup, "Context lookup failed");
                } else {
                    info!(%tool, %lookup, "Context fetched");
                }
            }
            ResearchEvent::ModelRequest { model } => info!(%model, "Calling model"),
            ResearchEvent::ModelResponse { content } => {
                let preview: String = content.chars().take(100).collect();
                let suffix = if content.chars().count() > 100 { "..." } else { "" };
                debug!("Model: {}{}", preview.replace('\n', "\\n"), suffix);
            }
            ResearchEvent::StageFailed { failure } => debug!(%failure, "Recovery stage failed"),
            ResearchEvent::Recovered { stage, full } => info!(%stage, full, "Reply recovered"),
            ResearchEvent::RecoveryFailed { attempts } => {
                warn!(attempts, "Reply could not be recovered")
            }
            ResearchEvent::Error { message } => warn!("{}", message),
        })),
        ..Default::default()
    }
}

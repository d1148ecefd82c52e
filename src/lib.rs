//! cosmic-query - research assistant
//!
//! Given a topic, cosmic-query pulls grounding text from Wikipedia and a web
//! search, asks a chat model for a structured multi-section summary, and
//! recovers a typed [`ResearchResponse`] from the reply even when the model
//! does not return clean JSON.
//!
//! # Quick Start
//!
//! ```ignore
//! use cosmic_query::{Assistant, AssistantConfig, Presenter, SaveTool};
//!
//! #[tokio::main]
//! async fn main() -> cosmic_query::Result<()> {
//!     let config = AssistantConfig::from_env()?;
//!     let presenter = Presenter::new(SaveTool::new(&config.output_path));
//!     let assistant = Assistant::new(config);
//!
//!     let run = assistant.research("Arrow of time").await?;
//!     println!("{}", presenter.present(&run.outcome, false).view);
//!     Ok(())
//! }
//! ```

mod assistant;
mod context;
mod error;
mod llm;
mod recovery;
mod render;
mod schema;
mod tools;

pub use assistant::{
    Assistant, AssistantConfig, DEFAULT_BASE_URL, EventCallback, OUTPUT_FORMAT, Prompt,
    PromptConfig, ResearchCallbacks, ResearchEvent, ResearchRun, SectionSpec, compose,
};
pub use context::{ContextBundle, Lookup, ResearchQuery};
pub use error::{Error, Result};
pub use llm::{ChatModel, ChatRequest, GroqClient, Message, Role};
pub use recovery::{
    RecoveryFailure, RecoveryOutcome, RecoveryPipeline, Stage, StageError, StageFailure,
    strip_fencing,
};
pub use render::{Presentation, Presenter, tool_rows};
pub use schema::{
    DEFAULT_TOPIC, Field, PartialResponse, ResearchResponse, response_schema, to_pretty_json,
};
pub use tools::{
    ContextSource, DEFAULT_OUTPUT_PATH, SaveTool, SourceLimits, ToolsConfig, WebSearch, Wikipedia,
};

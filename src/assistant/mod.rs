//! Research assistant implementation.
//!
//! The assistant fetches grounding text from Wikipedia and the web, asks the
//! model for a structured summary, and recovers a typed result from whatever
//! the model sent back.

mod config;
mod events;
mod prompt;

pub use config::{AssistantConfig, DEFAULT_BASE_URL};
pub use events::{EventCallback, ResearchCallbacks, ResearchEvent};
pub use prompt::{OUTPUT_FORMAT, Prompt, PromptConfig, SectionSpec, compose};

use crate::context::{ContextBundle, Lookup, ResearchQuery};
use crate::error::{Error, Result};
use crate::llm::{ChatModel, ChatRequest, GroqClient, Message};
use crate::recovery::{RecoveryOutcome, RecoveryPipeline};
use crate::tools::{ContextSource, WebSearch, Wikipedia};
use events::verbose_callbacks;
use std::sync::{Arc, Mutex};
use tokio::task::JoinError;
use tracing::info;

/// Everything produced while researching one topic.
#[derive(Debug, Clone)]
pub struct ResearchRun {
    pub query: ResearchQuery,
    pub context: ContextBundle,
    /// The model reply, untouched
    pub raw: String,
    pub outcome: RecoveryOutcome,
}

/// Researches topics with a model grounded in Wikipedia and web search.
pub struct Assistant {
    config: AssistantConfig,
    wiki: Arc<dyn ContextSource>,
    search: Arc<dyn ContextSource>,
    model: Arc<dyn ChatModel>,
    recovery: RecoveryPipeline,
    /// Callbacks for observability
    callbacks: ResearchCallbacks,
}

impl Assistant {
    /// Create an assistant backed by Wikipedia, DuckDuckGo and the configured
    /// chat completions endpoint.
    pub fn new(config: AssistantConfig) -> Self {
        let wiki = Arc::new(Wikipedia::new(config.tools.wiki, config.timeout_secs));
        let search = Arc::new(WebSearch::new(config.tools.search, config.timeout_secs));
        let model = Arc::new(GroqClient::new(
            config.base_url.clone(),
            config.api_key.clone(),
            config.timeout_secs,
        ));
        Self::with_components(config, wiki, search, model)
    }

    /// Create an assistant from explicit sources and model.
    pub fn with_components(
        config: AssistantConfig,
        wiki: Arc<dyn ContextSource>,
        search: Arc<dyn ContextSource>,
        model: Arc<dyn ChatModel>,
    ) -> Self {
        Self {
            config,
            wiki,
            search,
            model,
            recovery: RecoveryPipeline::new(),
            callbacks: ResearchCallbacks::default(),
        }
    }

    // =========================================================================
    // Builder methods for callbacks
    // =========================================================================

    /// Forward every event to `tracing`.
    pub fn verbose(mut self, enabled: bool) -> Self {
        if enabled {
            self.callbacks = verbose_callbacks();
        }
        self
    }

    /// Set a callback for context fetch events.
    pub fn on_context_fetched<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResearchEvent) + Send + Sync + 'static,
    {
        self.callbacks.on_context_fetched = Some(Arc::new(f));
        self
    }

    /// Set a callback for model response events.
    pub fn on_model_response<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResearchEvent) + Send + Sync + 'static,
    {
        self.callbacks.on_model_response = Some(Arc::new(f));
        self
    }

    /// Set a callback for failed recovery stages.
    pub fn on_stage_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResearchEvent) + Send + Sync + 'static,
    {
        self.callbacks.on_stage_failed = Some(Arc::new(f));
        self
    }

    /// Set a catch-all callback for any event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResearchEvent) + Send + Sync + 'static,
    {
        self.callbacks.on_event = Some(Arc::new(f));
        self
    }

    /// Record every event so it can be taken with [`Assistant::take_events`].
    pub fn capture_events(mut self, enabled: bool) -> Self {
        if enabled {
            self.callbacks.captured_events = Some(Arc::new(Mutex::new(Vec::new())));
        } else {
            self.callbacks.captured_events = None;
        }
        self
    }

    /// Take captured events.
    pub fn take_events(&self) -> Vec<ResearchEvent> {
        if let Some(ref events) = self.callbacks.captured_events
            && let Ok(mut events) = events.lock()
        {
            return std::mem::take(&mut *events);
        }
        Vec::new()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    pub fn recovery(&self) -> &RecoveryPipeline {
        &self.recovery
    }

    fn emit(&self, event: ResearchEvent) {
        self.callbacks.emit(&event);
    }

    // =========================================================================
    // Pipeline steps
    // =========================================================================

    /// Fetch Wikipedia and web context for the query, concurrently.
    ///
    /// A failing tool does not fail the query: its side of the bundle is
    /// recorded as [`Lookup::Failed`] (or [`Lookup::TimedOut`]) and
    /// contributes no text.
    pub async fn gather_context(&self, query: &ResearchQuery) -> ContextBundle {
        let wiki_task = spawn_fetch(&self.wiki, query);
        let search_task = spawn_fetch(&self.search, query);
        let (wiki, search) = futures::future::join(wiki_task, search_task).await;

        let wiki = self.settle(self.wiki.name(), wiki);
        let search = self.settle(self.search.name(), search);
        ContextBundle::new(wiki, search)
    }

    fn settle(
        &self,
        tool: &str,
        result: std::result::Result<Result<Lookup>, JoinError>,
    ) -> Lookup {
        let lookup = match result {
            Ok(Ok(lookup)) => lookup,
            Ok(Err(e)) => Lookup::from_error(&e),
            Err(e) => Lookup::Failed(format!("lookup task failed: {}", e)),
        };
        self.emit(ResearchEvent::ContextFetched {
            tool: tool.to_string(),
            lookup: lookup.clone(),
        });
        lookup
    }

    /// Send the prompt to the model and return its raw reply.
    pub async fn invoke_model(&self, prompt: &Prompt) -> Result<String> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                Message::system(prompt.system.clone()),
                Message::user(prompt.human.clone()),
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        self.emit(ResearchEvent::ModelRequest {
            model: request.model.clone(),
        });

        let model = Arc::clone(&self.model);
        let result = tokio::task::spawn_blocking(move || model.complete(&request))
            .await
            .map_err(|e| Error::Model(format!("model task failed: {}", e)))
            .and_then(|reply| reply);

        match result {
            Ok(content) => {
                self.emit(ResearchEvent::ModelResponse {
                    content: content.clone(),
                });
                Ok(content)
            }
            Err(e) => {
                self.emit(ResearchEvent::Error {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Run the recovery cascade over a raw reply.
    pub fn recover(&self, raw: &str) -> RecoveryOutcome {
        let outcome = self.recovery.recover(raw);

        for failure in outcome.attempts() {
            self.emit(ResearchEvent::StageFailed {
                failure: failure.clone(),
            });
        }
        match outcome.stage() {
            Some(stage) => self.emit(ResearchEvent::Recovered {
                stage,
                full: outcome.is_full(),
            }),
            None => self.emit(ResearchEvent::RecoveryFailed {
                attempts: outcome.attempts().len(),
            }),
        }

        outcome
    }

    // =========================================================================
    // Main entry point
    // =========================================================================

    /// Research a topic end to end.
    ///
    /// Fails only when the topic is empty or the model call fails; an
    /// unparseable reply is reported through [`RecoveryOutcome::Failed`].
    pub async fn research(&self, topic: &str) -> Result<ResearchRun> {
        let query = ResearchQuery::new(topic)?;
        info!(topic = %query, "Researching");

        let context = self.gather_context(&query).await;
        let prompt = compose(
            query.as_str(),
            context.wiki_context(),
            context.search_context(),
            &self.config.prompt,
        );

        let raw = self.invoke_model(&prompt).await?;
        let outcome = self.recover(&raw);

        Ok(ResearchRun {
            query,
            context,
            raw,
            outcome,
        })
    }
}

fn spawn_fetch(
    source: &Arc<dyn ContextSource>,
    query: &ResearchQuery,
) -> tokio::task::JoinHandle<Result<Lookup>> {
    let source = Arc::clone(source);
    let query = query.as_str().to_string();
    tokio::task::spawn_blocking(move || source.fetch(&query))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::Stage;

    const ENTROPY_REPLY: &str = "```json\n{\"topic\":\"Entropy\",\"summary\":\"**Intro**\\n\\nText.\",\"sources\":[\"Wikipedia: Entropy\"],\"tools_used\":[\"Wikipedia\"]}\n```";

    struct FakeSource {
        name: &'static str,
        result: std::result::Result<&'static str, &'static str>,
    }

    impl ContextSource for FakeSource {
        fn name(&self) -> &str {
            self.name
        }

        fn fetch(&self, _query: &str) -> Result<Lookup> {
            match self.result {
                Ok(text) => Ok(Lookup::from_text(text.to_string())),
                Err(message) => Err(Error::tool(self.name, message)),
            }
        }
    }

    struct StalledSource;

    impl ContextSource for StalledSource {
        fn name(&self) -> &str {
            "Wikipedia"
        }

        fn fetch(&self, _query: &str) -> Result<Lookup> {
            Err(Error::Timeout {
                operation: "Wikipedia".to_string(),
                secs: 5,
            })
        }
    }

    struct FakeModel {
        reply: std::result::Result<&'static str, &'static str>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl FakeModel {
        fn replying(reply: &'static str) -> Self {
            Self {
                reply: Ok(reply),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl ChatModel for FakeModel {
        fn complete(&self, request: &ChatRequest) -> Result<String> {
            self.requests.lock().unwrap().push(request.clone());
            self.reply
                .map(str::to_string)
                .map_err(|e| Error::Model(e.to_string()))
        }
    }

    fn assistant(
        wiki: std::result::Result<&'static str, &'static str>,
        search: std::result::Result<&'static str, &'static str>,
        model: Arc<FakeModel>,
    ) -> Assistant {
        Assistant::with_components(
            AssistantConfig::new("test-model"),
            Arc::new(FakeSource {
                name: "Wikipedia",
                result: wiki,
            }),
            Arc::new(FakeSource {
                name: "Web Search",
                result: search,
            }),
            model,
        )
    }

    #[test]
    fn test_research_full_result() {
        let model = Arc::new(FakeModel::replying(ENTROPY_REPLY));
        let assistant = assistant(
            Ok("Page: Entropy\nSummary: disorder"),
            Ok("Entropy - Britannica"),
            model.clone(),
        );

        let run = tokio_test::block_on(assistant.research("  Entropy ")).unwrap();

        assert_eq!(run.query.as_str(), "Entropy");
        assert_eq!(run.raw, ENTROPY_REPLY);
        match &run.outcome {
            RecoveryOutcome::Full {
                response, stage, ..
            } => {
                assert_eq!(*stage, Stage::DirectParse);
                assert_eq!(response.topic, "Entropy");
                assert_eq!(response.sources.len(), 1);
                assert_eq!(response.tools_used.len(), 1);
            }
            other => panic!("expected full result, got {:?}", other),
        }

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "test-model");
        let human = &requests[0].messages[1].content;
        assert!(human.contains("Research Topic: Entropy"));
        assert!(human.contains("Page: Entropy\nSummary: disorder"));
        assert!(human.contains("Entropy - Britannica"));
    }

    #[test]
    fn test_tool_failure_is_recorded_not_fatal() {
        let model = Arc::new(FakeModel::replying(ENTROPY_REPLY));
        let assistant = assistant(Err("HTTP error 503"), Ok(""), model.clone());

        let run = tokio_test::block_on(assistant.research("Entropy")).unwrap();

        assert!(run.context.wiki.is_failed());
        assert_eq!(run.context.search, Lookup::NoResults);
        assert!(run.context.is_empty());
        assert!(run.outcome.is_full());
    }

    #[test]
    fn test_tool_timeout_is_kept_distinct() {
        let model = Arc::new(FakeModel::replying(ENTROPY_REPLY));
        let assistant = Assistant::with_components(
            AssistantConfig::new("test-model"),
            Arc::new(StalledSource),
            Arc::new(FakeSource {
                name: "Web Search",
                result: Ok("results"),
            }),
            model,
        );

        let run = tokio_test::block_on(assistant.research("Entropy")).unwrap();

        assert!(run.context.wiki.is_timed_out());
        assert_eq!(run.context.wiki_context(), "");
        assert_eq!(run.context.search_context(), "results");
        assert!(run.outcome.is_full());
    }

    #[test]
    fn test_model_failure_is_fatal() {
        let model = Arc::new(FakeModel {
            reply: Err("rate limited"),
            requests: Mutex::new(Vec::new()),
        });
        let assistant = assistant(Ok("wiki"), Ok("web"), model);

        let err = tokio_test::block_on(assistant.research("Entropy")).unwrap_err();
        assert!(matches!(err, Error::Model(_)));
    }

    #[test]
    fn test_empty_topic_is_rejected_before_any_call() {
        let model = Arc::new(FakeModel::replying(ENTROPY_REPLY));
        let assistant = assistant(Ok("wiki"), Ok("web"), model.clone());

        let err = tokio_test::block_on(assistant.research("   ")).unwrap_err();
        assert!(matches!(err, Error::EmptyTopic));
        assert!(model.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn test_events_are_captured() {
        let model = Arc::new(FakeModel::replying("Sorry, I cannot comply."));
        let assistant = assistant(Ok("wiki"), Ok("web"), model).capture_events(true);

        let run = tokio_test::block_on(assistant.research("Entropy")).unwrap();
        assert!(matches!(run.outcome, RecoveryOutcome::Failed(_)));

        let events = assistant.take_events();
        let fetched = events
            .iter()
            .filter(|e| matches!(e, ResearchEvent::ContextFetched { .. }))
            .count();
        let stage_failures = events
            .iter()
            .filter(|e| matches!(e, ResearchEvent::StageFailed { .. }))
            .count();
        assert_eq!(fetched, 2);
        assert_eq!(stage_failures, 3);
        assert!(matches!(
            events.last(),
            Some(ResearchEvent::RecoveryFailed { attempts: 3 })
        ));
        assert!(assistant.take_events().is_empty());
    }
}

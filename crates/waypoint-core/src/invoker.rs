//! The generation invoker: one bounded request/response round trip.
//!
//! The invoker assembles the chat messages for a stage (system prompt, then
//! the serialized context and output schema), sends them through a
//! [`ChatBackend`], and hands back the raw text. It never retries and never
//! parses; both belong to the pipeline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{ChatBackend, ChatMessage, ChatRequest, Role};
use crate::context::StageContext;
use crate::error::{GenerationError, truncate_chars};
use crate::prompt::PromptEntry;
use crate::schema::format_violations;
use crate::stage::Stage;

/// Characters of prompt/output text included in debug logs.
const LOG_PREVIEW_CHARS: usize = 2_000;

/// Characters of a rejected reply echoed back in a correction turn.
const CORRECTION_ECHO_CHARS: usize = 8_000;

/// Model and limits applied to every call.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokerSettings {
    pub model: String,
    pub temperature: Option<f32>,
    /// Upper bound on a single backend call.
    pub timeout: Duration,
}

impl InvokerSettings {
    pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);

    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}

impl Default for InvokerSettings {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MODEL)
    }
}

/// A rejected reply and what was wrong with it, sent back to the backend
/// for one corrective attempt.
#[derive(Debug, Clone)]
pub struct Correction {
    pub previous_output: String,
    pub problems: String,
}

impl Correction {
    /// Describe a contract failure: the violation list for schema errors,
    /// the decoder message for malformed JSON.
    pub fn from_error(previous_output: &str, error: &GenerationError) -> Self {
        let problems = match error.violations() {
            [] => error.to_string(),
            violations => format_violations(violations),
        };
        Self {
            previous_output: previous_output.to_string(),
            problems,
        }
    }

    fn instruction(&self) -> String {
        format!(
            "Your previous reply did not satisfy OUTPUT_SCHEMA: {}. \
             Reply again with a single corrected JSON object and nothing else.",
            self.problems
        )
    }
}

/// Sends stage prompts to a backend.
#[derive(Clone)]
pub struct GenerationInvoker {
    backend: Arc<dyn ChatBackend>,
    settings: InvokerSettings,
}

impl std::fmt::Debug for GenerationInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationInvoker")
            .field("backend", &self.backend.name())
            .field("settings", &self.settings)
            .finish()
    }
}

impl GenerationInvoker {
    pub fn new(backend: Arc<dyn ChatBackend>, settings: InvokerSettings) -> Self {
        Self { backend, settings }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn settings(&self) -> &InvokerSettings {
        &self.settings
    }

    /// Build the chat request for one stage call.
    ///
    /// The conversation is the stage prompt as the system message and one
    /// user message with the context and schema. A correction appends the
    /// rejected reply as an assistant turn and the fix-up instruction as a
    /// final user turn.
    pub fn build_request(
        &self,
        prompt: &PromptEntry,
        context: &StageContext,
        schema: &Value,
        correction: Option<&Correction>,
    ) -> Result<ChatRequest, GenerationError> {
        let stage = context.stage();
        let schema_text = serde_json::to_string_pretty(schema)
            .map_err(|source| GenerationError::ContextEncoding { stage, source })?;
        let user = format!(
            "{label}:\n{context}\n\nOUTPUT_SCHEMA:\n{schema_text}\n\n\
             Respond with a single JSON object that conforms to OUTPUT_SCHEMA.",
            label = context.label(),
            context = context.to_json_pretty()?,
        );

        let mut messages = vec![ChatMessage::system(prompt.text()), ChatMessage::user(user)];
        if let Some(correction) = correction {
            messages.push(ChatMessage {
                role: Role::Assistant,
                content: truncate_chars(&correction.previous_output, CORRECTION_ECHO_CHARS),
            });
            messages.push(ChatMessage::user(correction.instruction()));
        }

        Ok(ChatRequest {
            model: self.settings.model.clone(),
            messages,
            json_mode: true,
            temperature: self.settings.temperature,
        })
    }

    /// Convenience wrapper: build the request and send it once.
    pub async fn invoke(
        &self,
        prompt: &PromptEntry,
        context: &StageContext,
        schema: &Value,
    ) -> Result<String, GenerationError> {
        let request = self.build_request(prompt, context, schema, None)?;
        self.send(&request, context.stage(), None).await
    }

    /// Send a prepared request, bounded by the configured timeout and the
    /// optional cancellation token.
    ///
    /// Absent or blank content becomes [`GenerationError::EmptyResponse`].
    pub async fn send(
        &self,
        request: &ChatRequest,
        stage: Stage,
        cancel: Option<&CancellationToken>,
    ) -> Result<String, GenerationError> {
        let started = Instant::now();
        if let Some(system) = request.messages.first() {
            debug!(
                %stage,
                prompt = %truncate_chars(&system.content, LOG_PREVIEW_CHARS),
                "sending stage prompt"
            );
        }

        let call = tokio::time::timeout(self.settings.timeout, self.backend.complete(request));
        let outcome = match cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => {
                    info!(%stage, "generation cancelled");
                    return Err(GenerationError::Cancelled { stage });
                }
                outcome = call => outcome,
            },
            None => call.await,
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let content = match outcome {
            Err(_) => {
                warn!(%stage, elapsed_ms, "backend call timed out");
                return Err(GenerationError::Timeout {
                    stage,
                    after: self.settings.timeout,
                });
            }
            Ok(Err(source)) => {
                warn!(%stage, elapsed_ms, error = %source, "backend call failed");
                return Err(GenerationError::Backend { stage, source });
            }
            Ok(Ok(content)) => content,
        };

        match content {
            Some(text) if !text.trim().is_empty() => {
                info!(
                    %stage,
                    backend = self.backend.name(),
                    model = %request.model,
                    elapsed_ms,
                    response_len = text.len(),
                    "backend call completed"
                );
                debug!(%stage, output = %truncate_chars(&text, LOG_PREVIEW_CHARS), "raw backend output");
                Ok(text)
            }
            _ => {
                warn!(%stage, elapsed_ms, "backend returned no content");
                Err(GenerationError::EmptyResponse { stage })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::backend::BackendError;
    use crate::context;
    use crate::domain::GoalProfile;

    /// Answers every request with a fixed result after an optional delay.
    struct FixedBackend {
        reply: Option<String>,
        delay: Duration,
    }

    #[async_trait]
    impl ChatBackend for FixedBackend {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _request: &ChatRequest) -> Result<Option<String>, BackendError> {
            tokio::time::sleep(self.delay).await;
            Ok(self.reply.clone())
        }
    }

    fn invoker(reply: Option<&str>, delay: Duration, timeout: Duration) -> GenerationInvoker {
        let backend = Arc::new(FixedBackend {
            reply: reply.map(str::to_string),
            delay,
        });
        let settings = InvokerSettings {
            timeout,
            ..InvokerSettings::default()
        };
        GenerationInvoker::new(backend, settings)
    }

    fn prompt() -> PromptEntry {
        PromptEntry::new(Stage::IntakeForm, "1", "Ask good questions.")
    }

    fn ctx() -> StageContext {
        context::intake_form(&GoalProfile::new("Learn Rust")).unwrap()
    }

    #[test]
    fn request_has_system_then_user_message() {
        let inv = invoker(Some("{}"), Duration::ZERO, Duration::from_secs(1));
        let schema = serde_json::json!({"type": "object"});
        let req = inv.build_request(&prompt(), &ctx(), &schema, None).unwrap();
        assert!(req.json_mode);
        assert_eq!(req.model, InvokerSettings::DEFAULT_MODEL);
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0].role, Role::System);
        assert_eq!(req.messages[0].content, "Ask good questions.");
        assert_eq!(req.messages[1].role, Role::User);
        assert!(req.messages[1].content.starts_with("USER_CONTEXT:\n"));
        assert!(req.messages[1].content.contains("\"goal\": \"Learn Rust\""));
        assert!(req.messages[1].content.contains("OUTPUT_SCHEMA:"));
    }

    #[test]
    fn correction_appends_assistant_and_user_turns() {
        let inv = invoker(Some("{}"), Duration::ZERO, Duration::from_secs(1));
        let correction = Correction {
            previous_output: "{\"questions\":1}".to_string(),
            problems: "questions: expected array, found number".to_string(),
        };
        let req = inv
            .build_request(&prompt(), &ctx(), &Value::Null, Some(&correction))
            .unwrap();
        assert_eq!(req.messages.len(), 4);
        assert_eq!(req.messages[2].role, Role::Assistant);
        assert_eq!(req.messages[2].content, "{\"questions\":1}");
        assert!(req.messages[3].content.contains("expected array, found number"));
    }

    #[tokio::test]
    async fn blank_content_is_empty_response() {
        for reply in [None, Some(""), Some("  \n ")] {
            let inv = invoker(reply, Duration::ZERO, Duration::from_secs(1));
            let err = inv.invoke(&prompt(), &ctx(), &Value::Null).await.unwrap_err();
            assert!(matches!(err, GenerationError::EmptyResponse { stage: Stage::IntakeForm }));
        }
    }

    #[tokio::test]
    async fn content_is_returned_verbatim() {
        let inv = invoker(Some(" {\"questions\":[]} "), Duration::ZERO, Duration::from_secs(1));
        let raw = inv.invoke(&prompt(), &ctx(), &Value::Null).await.unwrap();
        assert_eq!(raw, " {\"questions\":[]} ");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_times_out() {
        let inv = invoker(Some("{}"), Duration::from_secs(30), Duration::from_secs(5));
        let err = inv.invoke(&prompt(), &ctx(), &Value::Null).await.unwrap_err();
        match err {
            GenerationError::Timeout { stage, after } => {
                assert_eq!(stage, Stage::IntakeForm);
                assert_eq!(after, Duration::from_secs(5));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_token_stops_the_call() {
        let inv = invoker(Some("{}"), Duration::from_secs(30), Duration::from_secs(60));
        let req = inv.build_request(&prompt(), &ctx(), &Value::Null, None).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let err = inv.send(&req, Stage::IntakeForm, Some(&token)).await.unwrap_err();
        assert!(matches!(err, GenerationError::Cancelled { .. }));
    }
}

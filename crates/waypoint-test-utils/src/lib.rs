//! Shared test utilities for waypoint integration tests.
//!
//! - [`ScriptedBackend`]: an in-process [`ChatBackend`] that plays back a
//!   queue of replies and records every request it receives.
//! - [`RoutedBackend`]: answers each request with a closure, for tests where
//!   call order is not deterministic (concurrent schedules).
//! - Fixtures: sample entities and well-formed backend replies.
//! - [`spawn_stub_chat_server`]: an axum server speaking the
//!   chat-completions wire format, for exercising the HTTP backend.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};

use waypoint_core::backend::{BackendError, ChatBackend, ChatRequest};
use waypoint_core::{
    Answer, Familiarity, GoalProfile, Milestone, Project, ProjectOutline, Question,
    QuestionResponse, QuestionType,
};

// ===========================================================================
// Scripted backend
// ===========================================================================

pub type Reply = Result<Option<String>, BackendError>;

/// Plays back queued replies in order. An exhausted script answers with a
/// non-transient error so a runaway retry loop fails fast.
#[derive(Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ChatRequest>>,
    delay: Duration,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply with content `text`.
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(Ok(Some(text.into())))
    }

    /// Queue a reply with no content at all.
    pub fn reply_none(self) -> Self {
        self.push(Ok(None))
    }

    /// Queue a backend failure.
    pub fn fail(self, error: BackendError) -> Self {
        self.push(Err(error))
    }

    /// Wait `delay` before answering each request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn push(self, reply: Reply) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Replies still queued.
    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<Option<String>, BackendError> {
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::Decode("script exhausted".to_string())))
    }
}

// ===========================================================================
// Routed backend
// ===========================================================================

type Responder = dyn Fn(&ChatRequest) -> Reply + Send + Sync;

/// Answers each request by calling a closure.
pub struct RoutedBackend {
    responder: Box<Responder>,
    calls: Mutex<usize>,
}

impl RoutedBackend {
    pub fn new(responder: impl Fn(&ChatRequest) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ChatBackend for RoutedBackend {
    fn name(&self) -> &str {
        "routed"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<Option<String>, BackendError> {
        *self.calls.lock().unwrap() += 1;
        // Yield so concurrent callers interleave.
        tokio::task::yield_now().await;
        (self.responder)(request)
    }
}

/// The user message carrying the stage context.
pub fn user_message(request: &ChatRequest) -> &str {
    request
        .messages
        .get(1)
        .map(|m| m.content.as_str())
        .unwrap_or_default()
}

// ===========================================================================
// Fixtures
// ===========================================================================

pub fn sample_profile() -> GoalProfile {
    GoalProfile {
        goal: "Launch a weekly cooking podcast".to_string(),
        time_per_week: Some(6.0),
        effort_level: Some("steady".to_string()),
        familiarity: Some(Familiarity::Beginner),
        work_style: None,
    }
}

pub fn sample_project() -> Project {
    Project {
        title: "Cooking podcast".to_string(),
        responses: vec![
            QuestionResponse {
                question: Question {
                    id: "outcome_tier".to_string(),
                    prompt: "What should exist when you are done?".to_string(),
                    question_type: QuestionType::SingleSelect,
                    options: vec![
                        "One pilot episode".to_string(),
                        "Five published episodes".to_string(),
                    ],
                    position: 0,
                },
                answer: Answer::single("Five published episodes"),
            },
            QuestionResponse {
                question: Question {
                    id: "constraints".to_string(),
                    prompt: "Anything that limits your schedule?".to_string(),
                    question_type: QuestionType::FreeText,
                    options: Vec::new(),
                    position: 1,
                },
                answer: Answer::single("Weekends only"),
            },
        ],
    }
}

/// An outline with one milestone per title.
pub fn sample_outline(titles: &[&str]) -> ProjectOutline {
    ProjectOutline {
        milestones: titles
            .iter()
            .map(|t| Milestone {
                title: t.to_string(),
                description: format!("Finish {t}."),
                success_criteria: Vec::new(),
                estimated_duration_days: None,
            })
            .collect(),
    }
}

/// A valid intake-form reply with `n` free-text questions.
pub fn intake_reply(n: usize) -> String {
    let questions: Vec<Value> = (0..n)
        .map(|i| {
            json!({
                "id": format!("q{}", i + 1),
                "prompt": format!("Question {}?", i + 1),
                "questionType": "free_text"
            })
        })
        .collect();
    json!({ "questions": questions }).to_string()
}

/// A valid outline reply with one milestone per title.
pub fn outline_reply(titles: &[&str]) -> String {
    let milestones: Vec<Value> = titles
        .iter()
        .map(|t| json!({ "title": t, "description": format!("Finish {t}.") }))
        .collect();
    json!({ "milestones": milestones }).to_string()
}

/// A valid schedule reply with `n` tasks titled `"<prefix> <i>"`, days
/// left for the parser to fill.
pub fn schedule_reply(prefix: &str, n: usize) -> String {
    let tasks: Vec<Value> = (0..n)
        .map(|i| {
            json!({
                "title": format!("{prefix} {}", i + 1),
                "objective": "Make progress.",
                "body": "Do the work.",
                "estimatedMinutes": 45
            })
        })
        .collect();
    json!({ "tasks": tasks }).to_string()
}

// ===========================================================================
// Stub chat-completions server
// ===========================================================================

/// One canned HTTP answer from the stub server.
#[derive(Debug, Clone)]
pub struct StubReply {
    pub status: u16,
    pub body: Value,
}

impl StubReply {
    /// A 200 response whose first choice carries `content`.
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: json!({
                "id": "chatcmpl-stub",
                "object": "chat.completion",
                "choices": [{
                    "index": 0,
                    "message": { "role": "assistant", "content": content.into() },
                    "finish_reason": "stop"
                }]
            }),
        }
    }

    /// A 200 response whose message content is `null`.
    pub fn null_content() -> Self {
        Self {
            status: 200,
            body: json!({
                "choices": [{ "index": 0, "message": { "role": "assistant", "content": null } }]
            }),
        }
    }

    pub fn status(status: u16, body: Value) -> Self {
        Self { status, body }
    }
}

#[derive(Clone)]
struct StubState {
    replies: Arc<Mutex<VecDeque<StubReply>>>,
    received: Arc<Mutex<Vec<Value>>>,
}

/// A running stub server.
pub struct StubServer {
    /// Full URL of the chat-completions route.
    pub endpoint: String,
    pub addr: SocketAddr,
    received: Arc<Mutex<Vec<Value>>>,
}

impl StubServer {
    /// JSON bodies of every request received so far.
    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }
}

async fn chat_completions(
    State(state): State<StubState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.received.lock().unwrap().push(body);
    let next = state.replies.lock().unwrap().pop_front();
    match next {
        Some(reply) => (
            StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(reply.body),
        ),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": { "message": "stub script exhausted" } })),
        ),
    }
}

/// Start a stub server on an ephemeral port that answers
/// `POST /v1/chat/completions` with `replies` in order.
pub async fn spawn_stub_chat_server(replies: Vec<StubReply>) -> StubServer {
    let state = StubState {
        replies: Arc::new(Mutex::new(replies.into())),
        received: Arc::new(Mutex::new(Vec::new())),
    };
    let received = Arc::clone(&state.received);
    let app = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind stub server");
    let addr = listener.local_addr().expect("stub server has no address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    StubServer {
        endpoint: format!("http://{addr}/v1/chat/completions"),
        addr,
        received,
    }
}

//! Structured generation pipeline for goal planning.
//!
//! Waypoint turns a user goal into three artifacts, one stage at a time:
//!
//! 1. an intake form of clarifying questions ([`Stage::IntakeForm`])
//! 2. a milestone outline built from the answered form ([`Stage::ProjectOutline`])
//! 3. a day-by-day task schedule per milestone ([`Stage::TaskSchedule`])
//!
//! Each stage runs the same pipeline: a pure context builder, a versioned
//! prompt from the [`PromptCatalog`], one call to a [`ChatBackend`] in JSON
//! mode, and a [`ResponseParser`] that validates the reply against the
//! stage schema and normalizes it. Every failure comes back as a typed
//! [`GenerationError`].

pub mod artifact;
pub mod backend;
pub mod context;
pub mod domain;
pub mod error;
pub mod invoker;
pub mod normalize;
pub mod parse;
pub mod pipeline;
pub mod prompt;
pub mod schema;
pub mod stage;

pub use artifact::{
    Artifact, IntakeForm, Milestone, ProjectOutline, Question, QuestionType, ScheduledTask,
    TaskSchedule,
};
pub use backend::{BackendError, ChatBackend, ChatMessage, ChatRequest, OpenAiChatBackend, OpenAiConfig};
pub use context::StageContext;
pub use domain::{Answer, Familiarity, GoalProfile, MilestoneSummary, Project, QuestionResponse};
pub use error::GenerationError;
pub use invoker::{GenerationInvoker, InvokerSettings};
pub use normalize::DayPolicy;
pub use parse::{ResponseParser, parse};
pub use pipeline::{Execution, ExecutionRecord, GenerationRequest, Generator, ProjectPlan, RetryPolicy};
pub use prompt::{CatalogError, PromptCatalog, PromptEntry};
pub use schema::{SchemaRegistry, Violation};
pub use stage::Stage;

//! Generative backend adapters.
//!
//! This module defines the [`ChatBackend`] trait every backend implements,
//! the backend-neutral request types, and [`OpenAiChatBackend`] for
//! OpenAI-compatible HTTP endpoints.
//!
//! ```text
//! GenerationInvoker
//!     |
//!     |  ChatRequest { model, [system, user], json_mode }
//!     v
//! Arc<dyn ChatBackend> --complete()--> Option<String>
//! ```

pub mod openai;
pub mod trait_def;
pub mod types;

pub use openai::{OpenAiChatBackend, OpenAiConfig};
pub use trait_def::ChatBackend;
pub use types::{BackendError, ChatMessage, ChatRequest, Role};

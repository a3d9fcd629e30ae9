//! The `ChatBackend` trait -- the adapter interface for generative backends.
//!
//! Any service that accepts an ordered list of role-tagged messages plus a
//! JSON-mode flag and answers with text (or nothing) can implement this
//! trait. The trait is object-safe so it can be stored as
//! `Arc<dyn ChatBackend>` and shared across concurrent generations.

use async_trait::async_trait;

use super::types::{BackendError, ChatRequest};

/// Adapter interface for chat-style completion endpoints.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Human-readable name for this backend (e.g. "openai").
    fn name(&self) -> &str;

    /// Send one request and return the first completion's text.
    ///
    /// `Ok(None)` means the backend answered but produced no content; the
    /// invoker turns that (and blank text) into an empty-response error.
    /// Implementations must not retry.
    async fn complete(&self, request: &ChatRequest) -> Result<Option<String>, BackendError>;
}

// Compile-time assertion: ChatBackend must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn ChatBackend) {}
};

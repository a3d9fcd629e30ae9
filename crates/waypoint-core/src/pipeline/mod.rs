//! Generation pipeline: requests, the generator that runs them, retry
//! policy, and execution records.
//!
//! ```text
//! GenerationRequest (stage + context)
//!     |
//!     v
//! Generator::run
//!     prompt catalog -> invoker -> ChatBackend
//!     raw text -> ResponseParser -> artifact
//!     |
//!     v
//! Execution { artifact, record }
//! ```

pub mod generator;
pub mod record;
pub mod request;
pub mod retry;

pub use generator::{DEFAULT_CONCURRENCY, Generator, ProjectPlan, RECOMMENDED_MILESTONES};
pub use record::{Execution, ExecutionRecord};
pub use request::GenerationRequest;
pub use retry::RetryPolicy;

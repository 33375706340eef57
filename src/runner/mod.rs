//! Execution, verification and cleanup of generated code.
//!
//! # Architecture
//!
//! ```text
//! code → SyntaxChecker (parse only)
//!      → CodeExecutor (Node.js sandbox) → ExecutionResult
//!      → SearchIndexVerifier (external state) → scores
//!      → CleanupCoordinator (drop + wait)
//! ```
//!
//! The sandbox, the verifier and the cleanup coordinator each open their own
//! database connection and close it before returning.

pub mod cleanup;
pub mod result;
pub mod rewrite;
pub mod sandbox;
pub mod syntax;
pub mod verifier;

pub use cleanup::{CleanupCoordinator, CleanupOutcome};
pub use result::ExecutionResult;
pub use rewrite::await_trailing_call;
pub use sandbox::{CodeExecutor, NodeSandbox, SandboxConfig, SandboxError, RESULT_MARKER};
pub use syntax::{NodeSyntaxChecker, SyntaxChecker, SyntaxVerdict};
pub use verifier::SearchIndexVerifier;

//! skill-eval: three-way evaluation harness for LLM-generated MongoDB code.
//!
//! Each evaluation case is run with the bare prompt, with reference
//! documentation and with curated skill files. The generated JavaScript is
//! executed in a Node.js sandbox against a live MongoDB deployment, the
//! search indexes it creates are verified, and every run is scored on
//! syntax, semantic, execution and result checks.

pub mod cases;
pub mod cli;
pub mod config;
pub mod error;
pub mod eval;
pub mod llm;
pub mod runner;
pub mod scoring;
pub mod store;

// Re-export commonly used types
pub use config::EvalConfig;
pub use error::{CaseError, ConfigError, FieldError, LlmError, StoreError, TaskError};
pub use eval::{Approach, Orchestrator, RunReport};

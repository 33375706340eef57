//! Command-line interface for skill-eval.
//!
//! Provides commands for running evaluations, validating and listing case
//! files, and resetting external state.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};

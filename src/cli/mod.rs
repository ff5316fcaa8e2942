//! Command-line interface for deckbench.
//!
//! Provides the benchmark commands (`try`, `models`, `prompts`, `routed`,
//! `suite`) and offline report analysis (`coverage`).

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};

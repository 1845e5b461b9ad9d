//! CLI layer for costlens.
//!
//! Provides the command-line interface using clap, with commands for
//! analyzing templates, pricing resource lists, and managing prompts.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};

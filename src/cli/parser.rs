//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// costlens: monthly cost estimates for cloud deployment templates.
///
/// Extracts billable resources from an ARM, Bicep or Terraform template
/// with an LLM, looks each one up through an MCP pricing tool, and writes
/// an HTML cost report.
#[derive(Parser, Debug)]
#[command(name = "costlens")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// Pricing MCP server URL (overrides `COSTLENS_MCP_URL`).
    #[arg(long, global = true)]
    pub mcp_url: Option<String>,

    /// Pricing tool invocations per resource (overrides `COSTLENS_FILTER_ATTEMPTS`).
    #[arg(long, global = true)]
    pub max_attempts: Option<usize>,

    /// Deadline in seconds for each external call (overrides `COSTLENS_CALL_TIMEOUT_SECS`).
    #[arg(long, global = true)]
    pub call_timeout: Option<u64>,

    /// Directory containing prompt template files (overrides `COSTLENS_PROMPT_DIR`).
    #[arg(long, global = true)]
    pub prompt_dir: Option<PathBuf>,

    /// Chat model for all agents (overrides `COSTLENS_MODEL`).
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Estimate the monthly cost of a deployment template.
    ///
    /// Progress is streamed to stderr while the report is produced.
    #[command(after_help = r#"Examples:
  costlens analyze main.bicep                    # Report + summary
  costlens analyze azuredeploy.json --html-only  # Only the HTML report
  cat main.tf | costlens analyze -               # Read from stdin
  costlens --format json analyze main.bicep | jq '.estimate.totalCost'
"#)]
    Analyze {
        /// Template file, or `-` for stdin.
        input: PathBuf,

        /// Print only the HTML report.
        #[arg(long)]
        html_only: bool,

        /// Do not stream progress to stderr.
        #[arg(short, long)]
        quiet: bool,
    },

    /// List the billable resources in a template.
    Extract {
        /// Template file, or `-` for stdin.
        input: PathBuf,
    },

    /// Price a JSON list of resources (as printed by `extract --format json`).
    #[command(after_help = r#"Examples:
  costlens --format json extract main.bicep > resources.json
  costlens price resources.json
  costlens --max-attempts 5 price resources.json
"#)]
    Price {
        /// Resources JSON file, or `-` for stdin.
        input: PathBuf,

        /// Do not stream progress to stderr.
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show the pricing tool's parameter schema.
    Schema,

    /// Write default prompt templates to a directory.
    ///
    /// Existing files are not overwritten.
    InitPrompts {
        /// Target directory (default: `~/.config/costlens/prompts`).
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

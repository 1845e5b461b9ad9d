//! # costlens
//!
//! Monthly cost estimates for cloud deployment templates.
//!
//! A template (ARM, Bicep, Terraform) goes through three stages:
//!
//! 1. **Extraction**: an LLM lists the billable resources.
//! 2. **Pricing**: each resource is looked up through a remote MCP pricing
//!    tool. The filter for each lookup is synthesized by an LLM from the
//!    tool's schema; an empty result feeds back into the next attempt,
//!    which is allowed to use wider fields.
//! 3. **Reporting**: the priced list is rolled up to a monthly total and
//!    written up as an HTML report.
//!
//! The pricing stage never fails a run: anything that goes wrong for a
//! resource (or for the whole session) leaves that resource with
//! "no pricing information".
//!
//! ## Example
//!
//! ```no_run
//! use costlens::agent::AgentConfig;
//! use costlens::analyzer::Analyzer;
//! use costlens::pricing::NoopSink;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> costlens::Result<()> {
//! let config = AgentConfig::from_env()?;
//! let analyzer = Analyzer::from_config(&config)?;
//! let report = analyzer
//!     .analyze("resource vm 'Microsoft.Compute/virtualMachines@2023-03-01' = {}", &NoopSink, &CancellationToken::new())
//!     .await?;
//! println!("{:.2} {}", report.estimate.total_cost, report.estimate.currency);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod analyzer;
pub mod cli;
pub mod core;
pub mod error;
pub mod mcp;
pub mod pricing;

pub use analyzer::{AnalysisReport, Analyzer};
pub use error::{Error, Result};

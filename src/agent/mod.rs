//! LLM agents for costlens.
//!
//! Three single-shot agents share a pluggable provider abstraction backed
//! by `OpenAI`-compatible APIs.
//!
//! # Architecture
//!
//! ```text
//! template → ExtractorAgent → Vec<Resource>
//!   └── pricing core → FilterAgent (one call per attempt) → Vec<ResourcePricing>
//!         └── CostEstimate → ReportAgent → HTML report
//! ```

pub mod config;
pub mod extractor;
pub mod filter;
pub mod json;
pub mod message;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod report;
pub mod traits;

// Re-export key types
pub use config::AgentConfig;
pub use extractor::ExtractorAgent;
pub use filter::FilterAgent;
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use prompt::PromptSet;
pub use provider::{LlmProvider, create_provider};
pub use report::ReportAgent;
pub use traits::{Agent, AgentResponse};

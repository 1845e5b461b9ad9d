//! MCP (Model Context Protocol) client for the pricing tool.
//!
//! # Architecture
//!
//! ```text
//! PricingOrchestrator
//!   ↓ establish()
//! McpSessionProvider ── streamable HTTP ──▶ pricing MCP server
//!   ↓ list tools, read input schema
//! McpPricingSession
//!   ↓ invoke(filter) = call_tool(get_retail_prices, filter)
//! PricingResult
//! ```

pub mod client;

pub use client::{McpPricingSession, McpSessionProvider};

//! MCP client for the remote pricing tool.
//!
//! [`McpSessionProvider`] connects over streamable HTTP, discovers the
//! pricing tool's input schema, and hands back an [`McpPricingSession`]
//! that invokes the tool once per filter.

use std::sync::Mutex;

use async_trait::async_trait;
use rmcp::model::{CallToolRequestParams, CallToolResult, JsonObject};
use rmcp::service::{Peer, RunningService};
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::{RoleClient, ServiceExt};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::{Filter, ParameterSchema, PriceRecord, PricingResult};
use crate::error::PricingError;
use crate::pricing::{PricingSession, Session, SessionProvider};

type ClientService = RunningService<RoleClient, ()>;

/// Opens MCP sessions against one pricing tool.
#[derive(Debug, Clone)]
pub struct McpSessionProvider {
    url: String,
    tool_name: String,
}

impl McpSessionProvider {
    /// Targets `tool_name` on the MCP server at `url`.
    pub fn new(url: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            tool_name: tool_name.into(),
        }
    }

    async fn connect(&self) -> Result<ClientService, PricingError> {
        let transport = StreamableHttpClientTransport::from_uri(self.url.clone());
        ().serve(transport).await.map_err(|e| {
            PricingError::session(format!("failed to connect to {}: {e}", self.url))
        })
    }

    async fn discover_schema(&self, service: &ClientService) -> Result<ParameterSchema, PricingError> {
        let tools = service
            .list_all_tools()
            .await
            .map_err(|e| PricingError::session(format!("failed to list tools: {e}")))?;

        let input_schema = select_tool_schema(
            tools
                .iter()
                .map(|tool| (tool.name.as_ref(), tool.input_schema.as_ref())),
            &self.tool_name,
        )?;
        ParameterSchema::from_json(&Value::Object(input_schema.clone()))
    }
}

#[async_trait]
impl SessionProvider for McpSessionProvider {
    async fn establish(&self) -> Result<Session, PricingError> {
        let service = self.connect().await?;
        info!(url = %self.url, "connected to pricing server");

        match self.discover_schema(&service).await {
            Ok(schema) => {
                let peer = service.peer().clone();
                Ok(Session::new(
                    Box::new(McpPricingSession {
                        peer,
                        service: Mutex::new(Some(service)),
                        tool_name: self.tool_name.clone(),
                    }),
                    schema,
                ))
            }
            Err(e) => {
                if let Err(close_err) = service.cancel().await {
                    warn!(error = %close_err, "failed to close connection after schema discovery failure");
                }
                Err(e)
            }
        }
    }
}

/// Picks the named tool's input schema from a tool listing.
fn select_tool_schema<'a>(
    mut tools: impl Iterator<Item = (&'a str, &'a JsonObject)>,
    name: &str,
) -> Result<&'a JsonObject, PricingError> {
    let (_, schema) = tools
        .find(|(tool, _)| *tool == name)
        .ok_or_else(|| PricingError::session(format!("tool `{name}` not found on MCP server")))?;
    if schema.is_empty() {
        return Err(PricingError::session(format!(
            "tool `{name}` does not have an input schema"
        )));
    }
    Ok(schema)
}

/// A live MCP connection bound to the pricing tool.
pub struct McpPricingSession {
    peer: Peer<RoleClient>,
    service: Mutex<Option<ClientService>>,
    tool_name: String,
}

impl std::fmt::Debug for McpPricingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpPricingSession")
            .field("tool_name", &self.tool_name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PricingSession for McpPricingSession {
    async fn invoke(&self, filter: &Filter) -> Result<PricingResult, PricingError> {
        let params: CallToolRequestParams = serde_json::from_value(serde_json::json!({
            "name": self.tool_name,
            "arguments": Value::Object(filter.to_json_object()),
        }))
        .map_err(|e| PricingError::invocation(format!("failed to build tool call: {e}")))?;

        let result: CallToolResult = self
            .peer
            .call_tool(params)
            .await
            .map_err(|e| PricingError::invocation(e.to_string()))?;

        let value = serde_json::to_value(&result)
            .map_err(|e| PricingError::invocation(format!("unreadable tool result: {e}")))?;
        parse_tool_output(&value)
    }

    async fn close(self: Box<Self>) -> Result<(), PricingError> {
        let service = self
            .service
            .into_inner()
            .map_err(|_| PricingError::cleanup("session lock poisoned"))?;
        let Some(service) = service else {
            return Ok(());
        };
        let reason = service
            .cancel()
            .await
            .map_err(|e| PricingError::cleanup(e.to_string()))?;
        debug!(?reason, "MCP client stopped");
        Ok(())
    }
}

/// Reads the price list out of a serialized `CallToolResult`.
///
/// The list is taken from structured content when present, else from the
/// first text content that parses as JSON. Any body without a readable list
/// (prose, bare JSON scalars, `null` lists, upstream error bodies) is an
/// empty result. Only a tool-reported error is an invocation failure.
fn parse_tool_output(result: &Value) -> Result<PricingResult, PricingError> {
    let texts: Vec<&str> = result
        .get("content")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    if result.get("isError").and_then(Value::as_bool) == Some(true) {
        let detail = if texts.is_empty() {
            "tool reported an error".to_string()
        } else {
            texts.join("\n")
        };
        return Err(PricingError::invocation(detail));
    }

    let body = result
        .get("structuredContent")
        .filter(|v| v.is_object())
        .cloned()
        .or_else(|| {
            texts
                .iter()
                .find_map(|text| serde_json::from_str::<Value>(text).ok())
        });

    let Some(body) = body else {
        warn!("pricing tool returned no JSON content");
        return Ok(PricingResult::default());
    };

    let Value::Object(body) = body else {
        warn!(%body, "pricing tool returned a non-object body");
        return Ok(PricingResult::default());
    };
    if let Some(error) = body.get("error") {
        warn!(%error, "pricing tool returned an error body");
    }

    let Some(list) = PRICE_LIST_KEYS.iter().find_map(|key| body.get(*key)) else {
        return Ok(PricingResult::default());
    };
    match serde_json::from_value::<Vec<PriceRecord>>(list.clone()) {
        Ok(data) => Ok(PricingResult::new(data)),
        Err(e) => {
            warn!(error = %e, "pricing tool returned an unreadable price list");
            Ok(PricingResult::default())
        }
    }
}

/// Keys under which price APIs return their record list.
const PRICE_LIST_KEYS: [&str; 3] = ["data", "Items", "items"];

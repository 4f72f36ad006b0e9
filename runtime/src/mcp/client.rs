use std::sync::atomic::{AtomicU64, Ordering};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use super::McpError;
use super::transport::McpTransport;
use super::types::{
    InitializeParams, InitializeResult, JsonRpcRequest, McpTool, ToolsCallParams, ToolsCallResult,
    ToolsListResult,
};

/// Upper bound on `tools/list` pages, guarding against a server that keeps
/// returning a cursor.
const MAX_LIST_PAGES: usize = 100;

/// Protocol operations against one MCP server.
pub struct McpClient {
    server: String,
    transport: Box<dyn McpTransport>,
    next_id: AtomicU64,
}

impl McpClient {
    pub fn new(server: impl Into<String>, transport: Box<dyn McpTransport>) -> Self {
        Self {
            server: server.into(),
            transport,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    /// Handshake, followed by the `initialized` notification.
    pub async fn initialize(&self) -> Result<InitializeResult, McpError> {
        let params = serde_json::to_value(InitializeParams::for_client())
            .map_err(|e| McpError::protocol(format!("failed to encode initialize params: {e}")))?;
        let result: InitializeResult = self.call("initialize", Some(params)).await?;

        if let Err(e) = self
            .transport
            .send(JsonRpcRequest::notification("notifications/initialized"))
            .await
        {
            tracing::debug!(server = %self.server, error = %e, "initialized notification not accepted");
        }
        tracing::info!(
            server = %self.server,
            remote = %result.server_info.name,
            protocol = %result.protocol_version,
            "MCP server initialized"
        );
        Ok(result)
    }

    /// Every tool the server offers, following `nextCursor` across pages.
    pub async fn list_tools(&self) -> Result<Vec<McpTool>, McpError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_LIST_PAGES {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let page: ToolsListResult = self.call("tools/list", params).await?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(tools),
            }
        }
        Err(McpError::protocol(format!(
            "tools/list did not finish after {MAX_LIST_PAGES} pages"
        )))
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolsCallResult, McpError> {
        let params = serde_json::to_value(ToolsCallParams {
            name: name.to_string(),
            arguments,
        })
        .map_err(|e| McpError::protocol(format!("failed to encode tools/call params: {e}")))?;
        self.call("tools/call", Some(params)).await
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Option<Value>) -> Result<T, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let response = self
            .transport
            .send(JsonRpcRequest::request(id, method, params))
            .await?
            .ok_or_else(|| McpError::protocol(format!("no response to {method}")))?;

        if let Some(error) = response.error {
            return Err(McpError::Server {
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }
        let result = response
            .result
            .ok_or_else(|| McpError::protocol(format!("{method} response has neither result nor error")))?;
        serde_json::from_value(result)
            .map_err(|e| McpError::protocol(format!("failed to parse {method} result: {e}")))
    }
}

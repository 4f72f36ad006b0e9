use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};

use super::McpError;
use super::types::{JsonRpcRequest, JsonRpcResponse};
use crate::util::http_client;

const SESSION_HEADER: &str = "mcp-session-id";

/// Carries JSON-RPC messages to one MCP server.
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Send a request and wait for its response. Notifications (no id)
    /// resolve to `None`.
    async fn send(&self, request: JsonRpcRequest) -> Result<Option<JsonRpcResponse>, McpError>;
}

/// Streamable HTTP transport: one POST per message. The response is either
/// plain JSON or an event stream whose `data:` lines carry the reply.
pub struct HttpTransport {
    http: reqwest::Client,
    endpoint: String,
    headers: BTreeMap<String, String>,
    session_id: Mutex<Option<String>>,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, headers: BTreeMap<String, String>, timeout: Duration) -> Self {
        Self {
            http: http_client(timeout),
            endpoint: endpoint.into(),
            headers,
            session_id: Mutex::new(None),
        }
    }
}

#[async_trait]
impl McpTransport for HttpTransport {
    async fn send(&self, request: JsonRpcRequest) -> Result<Option<JsonRpcResponse>, McpError> {
        let mut builder = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json, text/event-stream")
            .json(&request);
        for (name, value) in &self.headers {
            builder = builder.header(name, value);
        }
        let session_id = self
            .session_id
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(session_id) = session_id {
            builder = builder.header(SESSION_HEADER, session_id);
        }

        let response = builder.send().await.map_err(|e| {
            McpError::connection(format!("request to {} failed: {e}", self.endpoint))
        })?;

        let status = response.status();
        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            *self.session_id.lock().unwrap_or_else(|e| e.into_inner()) = Some(session.to_string());
        }
        if !status.is_success() {
            return Err(McpError::connection(format!(
                "HTTP {} from MCP server {}",
                status.as_u16(),
                self.endpoint
            )));
        }
        if request.id.is_none() {
            return Ok(None);
        }

        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));
        let body = response
            .text()
            .await
            .map_err(|e| McpError::connection(format!("failed to read response body: {e}")))?;

        let parsed = if is_event_stream {
            parse_event_stream(&body, request.id)?
        } else {
            serde_json::from_str::<JsonRpcResponse>(&body)
                .map_err(|e| McpError::protocol(format!("invalid JSON-RPC response: {e}")))?
        };
        Ok(Some(parsed))
    }
}

/// The response in an event stream body that answers `id`.
fn parse_event_stream(body: &str, id: Option<u64>) -> Result<JsonRpcResponse, McpError> {
    event_payloads(body)
        .iter()
        .filter_map(|data| serde_json::from_str::<JsonRpcResponse>(data).ok())
        .find(|response| response.id == id)
        .ok_or_else(|| McpError::protocol("event stream carried no response for the request"))
}

/// Data of each event. Events end at a blank line; the `data:` lines of one
/// event are joined with `\n`.
fn event_payloads(body: &str) -> Vec<String> {
    let mut events = Vec::new();
    let mut data: Vec<&str> = Vec::new();
    for line in body.lines() {
        if line.is_empty() {
            if !data.is_empty() {
                events.push(data.join("\n"));
                data.clear();
            }
        } else if let Some(value) = line.strip_prefix("data:") {
            data.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }
    if !data.is_empty() {
        events.push(data.join("\n"));
    }
    events
}

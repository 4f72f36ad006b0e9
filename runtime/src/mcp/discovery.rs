//! Turns MCP server listings into registrable tools.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::McpError;
use super::client::McpClient;
use super::transport::HttpTransport;
use super::types::McpTool;
use crate::tool::{Tool, ToolError, ToolHandler, ToolInput};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// One entry of the MCP configuration object, keyed by server name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct McpServerConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub transport: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Present for process-launched servers, which are not supported.
    #[serde(default)]
    pub command: Option<String>,
}

impl McpServerConfig {
    fn endpoint(&self, name: &str) -> Result<&str, McpError> {
        if self.command.is_some() || self.transport.as_deref() == Some("stdio") {
            return Err(McpError::Config {
                message: format!("server '{name}' uses the stdio transport; only HTTP servers are supported"),
            });
        }
        match self.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(url),
            _ => Err(McpError::Config {
                message: format!("server '{name}' has no url"),
            }),
        }
    }
}

/// Parse `{"<name>": {"url": ..., "headers": {...}}, ...}`. Blank input is
/// an empty configuration.
pub fn parse_server_configs(raw: &str) -> Result<BTreeMap<String, McpServerConfig>, McpError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(raw).map_err(|e| McpError::Config {
        message: format!("MCP configuration must be a JSON object of servers: {e}"),
    })
}

/// Routes a local tool call to `tools/call` on its originating server.
pub struct McpToolHandler {
    client: Arc<McpClient>,
    remote_name: String,
}

impl McpToolHandler {
    pub fn new(client: Arc<McpClient>, remote_name: impl Into<String>) -> Self {
        Self {
            client,
            remote_name: remote_name.into(),
        }
    }
}

#[async_trait]
impl ToolHandler for McpToolHandler {
    async fn call(&self, input: ToolInput) -> Result<Value, ToolError> {
        let result = self
            .client
            .call_tool(&self.remote_name, input.args)
            .await
            .map_err(|e| {
                ToolError::provider(
                    e.to_string(),
                    Some(json!({ "server": self.client.server(), "tool": self.remote_name })),
                )
            })?;
        if result.is_error {
            let text = result.text();
            let message = if text.is_empty() {
                format!("MCP tool '{}' reported an error", self.remote_name)
            } else {
                text
            };
            return Err(ToolError::provider(
                message,
                Some(json!({ "server": self.client.server(), "content": result.content })),
            ));
        }
        Ok(result.flatten())
    }
}

/// Coerce a remote input schema into an object schema the validator and
/// function-calling models accept.
pub fn normalize_input_schema(schema: Option<Value>) -> Value {
    let mut schema = match schema {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    schema.remove("$schema");
    schema.insert("type".to_string(), Value::String("object".to_string()));
    if !schema.get("properties").is_some_and(Value::is_object) {
        schema.insert("properties".to_string(), Value::Object(Map::new()));
    }
    Value::Object(schema)
}

fn to_tool(client: &Arc<McpClient>, remote: McpTool) -> Tool {
    let description = remote.description.unwrap_or_default();
    let parameters = normalize_input_schema(remote.input_schema);
    let handler = Arc::new(McpToolHandler::new(client.clone(), remote.name.clone()));
    Tool::new(remote.name, description, parameters, handler)
}

/// Initialize a client on an already-built transport and list its tools.
pub async fn discover_with_client(client: McpClient) -> Result<Vec<Tool>, McpError> {
    client.initialize().await?;
    let remote_tools = client.list_tools().await?;
    let client = Arc::new(client);
    Ok(remote_tools
        .into_iter()
        .map(|remote| to_tool(&client, remote))
        .collect())
}

pub async fn discover_server(name: &str, config: &McpServerConfig) -> Result<Vec<Tool>, McpError> {
    let endpoint = config.endpoint(name)?;
    let timeout = Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
    let transport = HttpTransport::new(endpoint, config.headers.clone(), timeout);
    discover_with_client(McpClient::new(name, Box::new(transport))).await
}

/// Tools of every configured server. A server that cannot be reached or
/// listed is logged and skipped.
pub async fn discover_all(configs: &BTreeMap<String, McpServerConfig>) -> Vec<Tool> {
    let mut tools = Vec::new();
    for (name, config) in configs {
        match discover_server(name, config).await {
            Ok(found) => {
                tracing::info!(event = "mcp_discovered", server = %name, tools = found.len(), "MCP tools discovered");
                tools.extend(found);
            }
            Err(e) => {
                tracing::error!(event = "mcp_discovery_failed", server = %name, error = %e, "skipping MCP server");
            }
        }
    }
    tools
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::client::tests::{ScriptedTransport, init_ok, ok};

    #[test]
    fn schema_is_coerced_to_object() {
        let schema = normalize_input_schema(Some(json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "required": ["path"]
        })));
        assert_eq!(
            schema,
            json!({"type": "object", "properties": {}, "required": ["path"]})
        );
        assert_eq!(
            normalize_input_schema(None),
            json!({"type": "object", "properties": {}})
        );
    }

    #[test]
    fn configs_parse_and_reject_stdio() {
        let configs = parse_server_configs(
            r#"{"fs": {"url": "http://localhost:8000/mcp", "headers": {"Authorization": "Bearer x"}},
                "local": {"command": "npx", "transport": "stdio"}}"#,
        )
        .unwrap();
        assert_eq!(configs["fs"].endpoint("fs").unwrap(), "http://localhost:8000/mcp");
        assert!(matches!(
            configs["local"].endpoint("local"),
            Err(McpError::Config { .. })
        ));
        assert!(parse_server_configs("  ").unwrap().is_empty());
        assert!(parse_server_configs("[1]").is_err());
    }

    #[tokio::test]
    async fn discovered_tools_call_back_to_their_server() {
        let transport = ScriptedTransport::with(vec![
            init_ok(),
            ok(json!({"tools": [{
                "name": "read-file",
                "description": "Read a file",
                "inputSchema": {"type": "object", "properties": {"path": {"type": "string"}}}
            }]})),
            ok(json!({"content": [{"type": "text", "text": "contents"}]})),
            ok(json!({"content": [{"type": "text", "text": "no such file"}], "isError": true})),
        ]);
        let tools = discover_with_client(McpClient::new("fs", Box::new(transport.clone())))
            .await
            .unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name(), "read-file");
        assert_eq!(tools[0].descriptor.description, "Read a file");

        let handler = tools[0].handler().unwrap();
        let mut args = Map::new();
        args.insert("path".into(), json!("/etc/hosts"));
        let out = handler.call(ToolInput::from_args(args.clone())).await.unwrap();
        assert_eq!(out, json!("contents"));

        let err = handler.call(ToolInput::from_args(args)).await.unwrap_err();
        assert!(matches!(err, ToolError::Provider { ref message, .. } if message == "no such file"));

        let sent = transport.sent.lock().unwrap();
        let call = sent.iter().find(|r| r.method == "tools/call").unwrap();
        assert_eq!(call.params.as_ref().unwrap()["name"], "read-file");
    }

    #[tokio::test]
    async fn unreachable_servers_are_skipped() {
        let mut configs = BTreeMap::new();
        configs.insert(
            "broken".to_string(),
            McpServerConfig {
                url: None,
                transport: None,
                headers: BTreeMap::new(),
                timeout_secs: None,
                command: None,
            },
        );
        assert!(discover_all(&configs).await.is_empty());
    }
}

//! Tools provided by external MCP servers.
//!
//! At startup every configured server is initialized and its tools listed;
//! each remote tool becomes a local [`Tool`](crate::tool::Tool) whose handler
//! routes `tools/call` back to the server it came from. Only HTTP servers are
//! supported.
//!
//! ```text
//! discover_all (startup)
//!   └── McpClient (per server: initialize, tools/list, tools/call)
//!         └── McpTransport (HTTP JSON-RPC)
//! ```

pub mod client;
pub mod discovery;
pub mod transport;
pub mod types;

pub use client::McpClient;
pub use discovery::{McpServerConfig, McpToolHandler, discover_all, discover_server, parse_server_configs};
pub use transport::{HttpTransport, McpTransport};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum McpError {
    /// Network or HTTP-level failure reaching the server.
    #[error("MCP connection error: {message}")]
    Connection { message: String },
    /// The server answered with something that is not valid MCP.
    #[error("MCP protocol error: {message}")]
    Protocol { message: String },
    /// JSON-RPC error object returned by the server.
    #[error("MCP server error {code}: {message}")]
    Server {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },
    #[error("invalid MCP configuration: {message}")]
    Config { message: String },
}

impl McpError {
    pub fn protocol(message: impl Into<String>) -> Self {
        McpError::Protocol {
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        McpError::Connection {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::McpError;

    #[test]
    fn error_display() {
        assert_eq!(
            McpError::connection("refused").to_string(),
            "MCP connection error: refused"
        );
        let e = McpError::Server {
            code: -32601,
            message: "method not found".into(),
            data: None,
        };
        assert_eq!(e.to_string(), "MCP server error -32601: method not found");
    }
}

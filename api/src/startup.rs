use std::sync::Arc;

use conductor_runtime::builtin::{register_builtins, register_gated};
use conductor_runtime::mcp::{McpError, discover_all, parse_server_configs};
use conductor_runtime::util::parse_csv;
use conductor_runtime::{
    Dispatcher, HttpStateStore, InMemoryKeyValueStore, RegistryError, StateResolver, Tool,
    ToolRegistry,
};

use crate::config::ServerConfig;
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to register built-in tools: {0}")]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Mcp(#[from] McpError),
}

/// Register discovered tools; a name collision skips the remote tool.
pub fn register_remote_tools(registry: &ToolRegistry, tools: Vec<Tool>) -> usize {
    let mut registered = 0;
    for tool in tools {
        let name = tool.name().to_string();
        match register_gated(registry, tool, false) {
            Ok(true) => registered += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::error!(event = "mcp_tool_skipped", tool = %name, error = %e, "MCP tool not registered");
            }
        }
    }
    registered
}

/// Build the registry (static tools, then MCP tools) and the dispatcher.
pub async fn build_state(config: &ServerConfig) -> Result<AppState, StartupError> {
    let registry = Arc::new(ToolRegistry::new());
    let builtins = register_builtins(&registry)?;

    let servers = parse_server_configs(&config.mcp_config)?;
    let remote = if servers.is_empty() {
        0
    } else {
        register_remote_tools(&registry, discover_all(&servers).await)
    };

    let store = HttpStateStore::new(config.state_url.clone(), config.state_timeout());
    let mut dispatcher = Dispatcher::new(registry.clone(), StateResolver::new(Arc::new(store)))
        .with_reserved(parse_csv(&config.reserved_tools));
    if config.enable_store {
        dispatcher = dispatcher.with_store(Arc::new(InMemoryKeyValueStore::new()));
    }

    tracing::info!(
        event = "registry_built",
        builtin_tools = builtins,
        mcp_servers = servers.len(),
        mcp_tools = remote,
        store_enabled = config.enable_store,
        "tool registry ready"
    );
    Ok(AppState::new(Arc::new(dispatcher)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serde_json::{Value, json};

    #[tokio::test]
    async fn builds_with_builtins_and_no_mcp_servers() {
        let config = ServerConfig::try_parse_from(["conductor-api", "--mcp-config", "{}"]).unwrap();
        let state = build_state(&config).await.unwrap();
        assert!(state.registry().resolve("echo").is_some());
        assert!(state.registry().resolve("sum_numbers").is_some());
    }

    #[tokio::test]
    async fn invalid_mcp_config_is_fatal() {
        let config = ServerConfig::try_parse_from(["conductor-api", "--mcp-config", "not json"]).unwrap();
        assert!(matches!(build_state(&config).await, Err(StartupError::Mcp(_))));
    }

    #[test]
    fn colliding_remote_tools_are_skipped() {
        let registry = ToolRegistry::new();
        register_builtins(&registry).unwrap();
        let remote = vec![
            Tool::from_fn("echo", "", json!({"type": "object"}), |_| async { Ok(Value::Null) }),
            Tool::from_fn("read-file", "", json!({"type": "object"}), |_| async { Ok(Value::Null) }),
        ];
        assert_eq!(register_remote_tools(&registry, remote), 1);
        assert!(registry.resolve("read_file").is_some());
    }
}

use std::time::Duration;

use clap::Parser;
use conductor_runtime::util::parse_env_bool_flag;
use url::Url;

/// Tool server configuration, from flags or environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "conductor-api", version, about = "Conductor tool server")]
pub struct ServerConfig {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Base URL of the orchestration engine's state API
    #[arg(long, env = "CONDUCTOR_STATE_URL", default_value = "http://0.0.0.0:2024")]
    pub state_url: Url,

    /// Timeout for one state fetch, in seconds
    #[arg(long, env = "CONDUCTOR_STATE_TIMEOUT_SECS", default_value_t = 10)]
    pub state_timeout_secs: u64,

    /// MCP servers as a JSON object: {"name": {"url": "...", "headers": {...}}}
    #[arg(long, env = "CONDUCTOR_MCP_CONFIG", default_value = "{}")]
    pub mcp_config: String,

    /// Extra tool names reserved for function-call delegation (comma-separated)
    #[arg(long, env = "CONDUCTOR_RESERVED_TOOLS", default_value = "")]
    pub reserved_tools: String,

    /// Attach an in-memory key-value store for store-injected tools
    #[arg(
        long,
        env = "CONDUCTOR_ENABLE_STORE",
        default_value = "false",
        action = clap::ArgAction::Set,
        value_parser = parse_flag
    )]
    pub enable_store: bool,
}

/// `1`, `true`, `yes` and `on` (any case) enable a flag; anything else disables it.
fn parse_flag(raw: &str) -> Result<bool, String> {
    Ok(parse_env_bool_flag(Some(raw.to_string()), false))
}

impl ServerConfig {
    pub fn state_timeout(&self) -> Duration {
        Duration::from_secs(self.state_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ServerConfig::try_parse_from(["conductor-api"]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.state_url.as_str(), "http://0.0.0.0:2024/");
        assert_eq!(config.state_timeout(), Duration::from_secs(10));
        assert_eq!(config.mcp_config, "{}");
        assert!(!config.enable_store);
    }

    #[test]
    fn flags_override_defaults() {
        let config = ServerConfig::try_parse_from([
            "conductor-api",
            "--port",
            "8080",
            "--reserved-tools",
            "a,b",
            "--enable-store",
            "true",
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.reserved_tools, "a,b");
        assert!(config.enable_store);
    }

    #[test]
    fn store_flag_accepts_env_style_values() {
        for (raw, expected) in [("1", true), ("YES", true), ("on", true), ("0", false), ("off", false)] {
            let config =
                ServerConfig::try_parse_from(["conductor-api", "--enable-store", raw]).unwrap();
            assert_eq!(config.enable_store, expected, "{raw}");
        }
    }
}

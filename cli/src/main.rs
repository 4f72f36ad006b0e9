mod commands;
mod util;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "conductor", version, about = "Conductor CLI: list and invoke tools on a running tool server")]
struct Cli {
    /// Tool server base URL
    #[arg(long, env = "CONDUCTOR_SERVER_URL", default_value = "http://localhost:3000")]
    server_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check tool server health
    Health {
        /// Skip pretty-printing
        #[arg(long)]
        raw: bool,
    },
    /// List the tools the server advertises
    Tools {
        /// Skip pretty-printing
        #[arg(long)]
        raw: bool,
    },
    /// Invoke a tool
    Call(commands::call::CallArgs),
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!(server_url = %cli.server_url, "conductor cli");

    let code = match cli.command {
        Commands::Health { raw } => commands::health::run(&cli.server_url, raw).await,
        Commands::Tools { raw } => commands::tools::run(&cli.server_url, raw).await,
        Commands::Call(args) => commands::call::run(&cli.server_url, args).await,
    };

    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn call_parses_thread_and_checkpoint() {
        let cli = Cli::try_parse_from([
            "conductor",
            "--server-url",
            "http://tools:8080",
            "call",
            "echo",
            "--kwargs",
            r#"{"msg":"hi"}"#,
            "--thread-id",
            "t1",
            "--checkpoint-id",
            "c1",
        ])
        .unwrap();
        assert_eq!(cli.server_url, "http://tools:8080");
        match cli.command {
            Commands::Call(args) => {
                assert_eq!(args.name, "echo");
                assert_eq!(args.checkpoint_id.as_deref(), Some("c1"));
            }
            _ => panic!("expected call"),
        }
    }

    #[test]
    fn checkpoint_requires_thread() {
        assert!(
            Cli::try_parse_from(["conductor", "call", "echo", "--checkpoint-id", "c1"]).is_err()
        );
    }
}

use clap::Args;
use conductor_core::tools::ToolCallRequest;

use crate::util::{exit_error, kwargs_object, parse_kwargs, read_json_from_file, server_request};

#[derive(Args)]
pub struct CallArgs {
    /// Tool name, as listed by `conductor tools`
    pub name: String,

    /// Tool arguments as a JSON object
    #[arg(long, short = 'k', default_value = "{}")]
    pub kwargs: String,

    /// Read tool arguments from file (use '-' for stdin)
    #[arg(long, conflicts_with = "kwargs")]
    pub kwargs_file: Option<String>,

    /// Conversation thread whose state is injected
    #[arg(long)]
    pub thread_id: Option<String>,

    /// Pin the injected state to a checkpoint of the thread
    #[arg(long, requires = "thread_id")]
    pub checkpoint_id: Option<String>,

    /// Skip pretty-printing (raw JSON for piping)
    #[arg(long)]
    pub raw: bool,
}

impl CallArgs {
    fn request(&self) -> Result<ToolCallRequest, String> {
        let kwargs = match &self.kwargs_file {
            Some(path) => kwargs_object(read_json_from_file(path)?)?,
            None => parse_kwargs(&self.kwargs)?,
        };
        Ok(ToolCallRequest {
            kwargs,
            thread_id: self.thread_id.clone(),
            checkpoint_id: self.checkpoint_id.clone(),
        })
    }
}

pub async fn run(server_url: &str, args: CallArgs) -> i32 {
    if args.name.trim().is_empty() {
        exit_error("Tool name must not be empty", Some("Run `conductor tools` to list tool names"));
    }
    let request = match args.request() {
        Ok(request) => request,
        Err(message) => exit_error(
            &message,
            Some("Example: conductor call echo --kwargs '{\"msg\": \"hi\"}'"),
        ),
    };
    let body = match serde_json::to_value(&request) {
        Ok(body) => body,
        Err(e) => exit_error(&format!("Failed to encode request: {e}"), None),
    };
    server_request(server_url, reqwest::Method::POST, &args.name, Some(body), args.raw).await
}

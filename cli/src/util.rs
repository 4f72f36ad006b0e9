use conductor_runtime::ClientError;
use conductor_runtime::ToolClient;
use conductor_runtime::client::RawResponse;
use serde_json::{Map, Value, json};

pub const EXIT_OK: i32 = 0;
pub const EXIT_CLIENT_ERROR: i32 = 1;
pub const EXIT_SERVER_ERROR: i32 = 2;
pub const EXIT_CONNECTION_ERROR: i32 = 3;
pub const EXIT_USAGE_ERROR: i32 = 4;

fn to_pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Structured usage error on stderr; exits with [`EXIT_USAGE_ERROR`].
pub fn exit_error(message: &str, docs_hint: Option<&str>) -> ! {
    eprintln!("{}", to_pretty(&cli_error(message, docs_hint)));
    std::process::exit(EXIT_USAGE_ERROR);
}

fn cli_error(message: &str, docs_hint: Option<&str>) -> Value {
    let mut err = json!({
        "error": "cli_error",
        "message": message
    });
    if let Some(hint) = docs_hint {
        err["docs_hint"] = json!(hint);
    }
    err
}

pub fn exit_code_for_status(status: u16) -> i32 {
    match status {
        200..=299 => EXIT_OK,
        400..=499 => EXIT_CLIENT_ERROR,
        _ => EXIT_SERVER_ERROR,
    }
}

/// Exit code and the JSON document to print for a client failure.
pub fn describe_client_error(err: &ClientError) -> (i32, Value) {
    match err {
        ClientError::InvalidUrl(message) => (
            EXIT_USAGE_ERROR,
            cli_error(
                &format!("Invalid server URL: {message}"),
                Some("Set --server-url or CONDUCTOR_SERVER_URL to e.g. http://localhost:3000"),
            ),
        ),
        ClientError::Connection { url, message } => (
            EXIT_CONNECTION_ERROR,
            json!({
                "error": "connection_error",
                "message": format!("{url}: {message}"),
                "docs_hint": "Is the tool server running? Check CONDUCTOR_SERVER_URL."
            }),
        ),
        ClientError::Api { status, error } => (
            exit_code_for_status(*status),
            serde_json::to_value(error).unwrap_or_else(|_| json!({"message": error.message})),
        ),
        ClientError::Decode(message) => (
            EXIT_SERVER_ERROR,
            json!({"error": "decode_error", "message": message}),
        ),
    }
}

/// Send a request to the server, print the body and return the exit code.
///
/// Exit codes: 0=success (2xx), 1=client error (4xx), 2=server error (5xx),
///             3=connection error, 4=usage error
pub async fn server_request(
    server_url: &str,
    method: reqwest::Method,
    segment: &str,
    body: Option<Value>,
    raw: bool,
) -> i32 {
    let client = match ToolClient::new(server_url) {
        Ok(client) => client,
        Err(e) => return report_error(&e),
    };
    match client.raw(method, segment, body.as_ref()).await {
        Ok(response) => print_response(&response, raw),
        Err(e) => report_error(&e),
    }
}

fn report_error(err: &ClientError) -> i32 {
    let (code, body) = describe_client_error(err);
    eprintln!("{}", to_pretty(&body));
    code
}

fn print_response(response: &RawResponse, raw: bool) -> i32 {
    let formatted = if raw {
        response.body.to_string()
    } else {
        to_pretty(&response.body)
    };
    let exit_code = exit_code_for_status(response.status);
    if exit_code == EXIT_OK {
        println!("{formatted}");
    } else {
        eprintln!("{formatted}");
    }
    exit_code
}

/// Parse `--kwargs` into an argument object.
pub fn parse_kwargs(raw: &str) -> Result<Map<String, Value>, String> {
    let value: Value = serde_json::from_str(raw).map_err(|e| format!("Invalid JSON in --kwargs: {e}"))?;
    kwargs_object(value)
}

pub fn kwargs_object(value: Value) -> Result<Map<String, Value>, String> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(format!(
            "--kwargs must be a JSON object, got {}",
            conductor_runtime::util::json_type_name(&other)
        )),
    }
}

/// Read a JSON document from a file, or from stdin when `path` is `-`.
pub fn read_json_from_file(path: &str) -> Result<Value, String> {
    let raw = if path == "-" {
        std::io::read_to_string(std::io::stdin()).map_err(|e| format!("Failed to read stdin: {e}"))?
    } else {
        std::fs::read_to_string(path).map_err(|e| format!("Failed to read file '{path}': {e}"))?
    };
    serde_json::from_str(&raw).map_err(|e| format!("Invalid JSON in '{path}': {e}"))
}

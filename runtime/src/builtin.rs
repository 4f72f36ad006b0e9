//! Tools shipped with the server.
//!
//! The static tool list: a few local tools exercising each injection style,
//! one helper, and the descriptors of the delegated agents that the
//! orchestration graph runs itself.

use conductor_core::tools::InjectedParam;
use serde_json::{Value, json};

use crate::registry::{RegistryError, ToolRegistry};
use crate::tool::{Tool, ToolError, ToolInput};

const GLOBAL_NAMESPACE: &str = "global";

fn echo() -> Tool {
    Tool::from_fn(
        "echo",
        "Return the given message unchanged.",
        json!({
            "type": "object",
            "properties": {"msg": {"type": "string", "description": "Message to echo"}},
            "required": ["msg"]
        }),
        |input| async move { Ok(Value::String(input.required_str("msg")?.to_string())) },
    )
}

fn whoami() -> Tool {
    Tool::from_fn(
        "whoami",
        "Return the conversation state this call runs in.",
        json!({"type": "object", "properties": {}}),
        |input| async move { Ok(input.args.get("state").cloned().unwrap_or_else(|| json!({}))) },
    )
    .with_injected(InjectedParam::whole_state("state"))
}

fn list_secrets() -> Tool {
    Tool::from_fn(
        "list_secrets",
        "List the secrets available in this conversation (names and descriptions only).",
        json!({"type": "object", "properties": {}}),
        |input| async move {
            let secrets = input
                .args
                .get("secrets")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let listed: Vec<Value> = secrets
                .iter()
                .filter_map(|secret| {
                    let name = secret.get("name")?.as_str()?;
                    Some(json!({
                        "name": name,
                        "description": secret.get("description").cloned().unwrap_or(Value::Null),
                    }))
                })
                .collect();
            Ok(Value::Array(listed))
        },
    )
    .with_injected(InjectedParam::state_field("secrets", "secrets"))
}

/// Namespace of store entries: the calling thread, or a shared one.
fn namespace(input: &ToolInput) -> String {
    input
        .config
        .as_ref()
        .map(|config| config.thread_id.clone())
        .unwrap_or_else(|| GLOBAL_NAMESPACE.to_string())
}

fn remember() -> Tool {
    Tool::from_fn(
        "remember",
        "Store a value under a key for the rest of the conversation.",
        json!({
            "type": "object",
            "properties": {
                "key": {"type": "string", "minLength": 1},
                "value": {"description": "Any JSON value"}
            },
            "required": ["key", "value"]
        }),
        |input| async move {
            let key = input.required_str("key")?;
            let value = input
                .args
                .get("value")
                .cloned()
                .ok_or_else(|| ToolError::invalid_argument("value", "Missing required field 'value'"))?;
            input.store()?.put(&namespace(&input), key, value);
            Ok(json!({"stored": key}))
        },
    )
    .with_store_param("store")
}

fn recall() -> Tool {
    Tool::from_fn(
        "recall",
        "Read a value previously stored with remember.",
        json!({
            "type": "object",
            "properties": {"key": {"type": "string", "minLength": 1}},
            "required": ["key"]
        }),
        |input| async move {
            let key = input.required_str("key")?;
            Ok(input
                .store()?
                .get(&namespace(&input), key)
                .unwrap_or(Value::Null))
        },
    )
    .with_store_param("store")
}

fn sum_numbers() -> Tool {
    Tool::from_fn(
        "sum_numbers",
        "Sum a list of numbers.",
        json!({
            "type": "object",
            "properties": {"numbers": {"type": "array", "items": {"type": "number"}}},
            "required": ["numbers"]
        }),
        |input| async move {
            let numbers = input
                .args
                .get("numbers")
                .and_then(Value::as_array)
                .ok_or_else(|| ToolError::invalid_argument("numbers", "'numbers' must be a list"))?;
            let mut total = 0.0;
            for (i, n) in numbers.iter().enumerate() {
                total += n.as_f64().ok_or_else(|| {
                    ToolError::invalid_argument("numbers", format!("numbers[{i}] is not a number"))
                })?;
            }
            Ok(json!(total))
        },
    )
}

fn task_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {"task": {"type": "string", "description": description}},
        "required": ["task"]
    })
}

fn delegated_agents() -> Vec<Tool> {
    vec![
        Tool::delegated(
            "coder_agent",
            "Write and run code to analyze data or build charts.",
            task_schema("What to compute or build"),
        ),
        Tool::delegated(
            "email_agent",
            "Read, filter and send email using the mailbox configured in the conversation secrets.",
            task_schema("What to do with the mailbox"),
        ),
        Tool::delegated(
            "generate_presentation",
            "Build a slide presentation on a topic.",
            task_schema("Topic and wishes for the presentation"),
        )
        .requires_env("IMAGE_GEN_NAME"),
    ]
}

pub fn builtin_tools() -> Vec<Tool> {
    let mut tools = vec![echo(), whoami(), list_secrets(), remember(), recall()];
    tools.extend(delegated_agents());
    tools
}

pub fn builtin_helpers() -> Vec<Tool> {
    vec![sum_numbers()]
}

/// Register `tool` unless one of its required environment variables is unset.
/// Returns whether it was registered.
pub fn register_gated(registry: &ToolRegistry, tool: Tool, helper: bool) -> Result<bool, RegistryError> {
    if let Some(var) = tool.missing_env() {
        tracing::info!(tool = %tool.name(), env = %var, "tool disabled: required environment variable not set");
        return Ok(false);
    }
    if helper {
        registry.register_helper(tool)?;
    } else {
        registry.register(tool)?;
    }
    Ok(true)
}

/// Register the static tool list and helpers; returns how many were registered.
pub fn register_builtins(registry: &ToolRegistry) -> Result<usize, RegistryError> {
    let mut registered = 0;
    for tool in builtin_tools() {
        registered += usize::from(register_gated(registry, tool, false)?);
    }
    for helper in builtin_helpers() {
        registered += usize::from(register_gated(registry, helper, true)?);
    }
    Ok(registered)
}

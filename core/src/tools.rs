use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use utoipa::ToSchema;

/// Key used when a sequence-shaped state is lifted into a mapping.
pub const MESSAGES_KEY: &str = "messages";

static ILLEGAL_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("static regex"));

/// Normalize a tool name to the function-calling convention.
///
/// Hyphens (and any other character outside `[A-Za-z0-9_]`) become
/// underscores, so `search-web` and `search_web` name the same tool.
pub fn normalize_tool_name(name: &str) -> String {
    ILLEGAL_NAME_CHARS
        .replace_all(name.trim(), "_")
        .into_owned()
}

/// Tool advertisement, as listed by `GET /tools`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON schema (type `object`) of the arguments the model must supply.
    /// Injected parameters are never part of it.
    #[schema(value_type = Object)]
    pub parameters: Value,
}

impl ToolDescriptor {
    /// Function-calling form, attached to validation failures.
    pub fn to_value(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "parameters": self.parameters,
        })
    }
}

/// Declares that parameter `param` is supplied from session state.
///
/// `state_key = None` injects the whole state object; `Some(key)` injects
/// `state[key]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectedParam {
    pub param: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,
}

impl InjectedParam {
    pub fn whole_state(param: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            state_key: None,
        }
    }

    pub fn state_field(param: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            state_key: Some(key.into()),
        }
    }
}

/// Request body of `POST /{tool_name}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ToolCallRequest {
    /// Arguments produced by the model
    #[serde(default)]
    #[schema(value_type = Object)]
    pub kwargs: Map<String, Value>,
    /// Conversation thread the call belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    /// Pins the state snapshot to a specific checkpoint of the thread
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<String>,
}

/// A single invocation, as seen by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub args: Map<String, Value>,
    pub call_id: String,
    pub thread_id: Option<String>,
    pub checkpoint_id: Option<String>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            args,
            call_id: String::new(),
            thread_id: None,
            checkpoint_id: None,
        }
    }

    pub fn from_request(
        name: impl Into<String>,
        call_id: impl Into<String>,
        request: ToolCallRequest,
    ) -> Self {
        Self {
            name: name.into(),
            args: request.kwargs,
            call_id: call_id.into(),
            thread_id: request.thread_id.filter(|id| !id.trim().is_empty()),
            checkpoint_id: request.checkpoint_id.filter(|id| !id.trim().is_empty()),
        }
    }

    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_checkpoint(mut self, checkpoint_id: impl Into<String>) -> Self {
        self.checkpoint_id = Some(checkpoint_id.into());
        self
    }
}

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Structured error response, designed for models rather than humans.
/// Every failure carries enough information for an automated caller to
/// understand what went wrong and how to retry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Machine-readable error code (see [`codes`])
    pub error: String,
    /// Human/model-readable description of what went wrong
    pub message: String,
    /// Tool the failure belongs to (if applicable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Dispatch phase in which the failure happened
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    /// Which argument caused the error (if applicable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// The value that was received (if applicable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received: Option<serde_json::Value>,
    /// Structured diagnosis (validation violations, provider detail, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Parameter schema of the tool, attached so the caller can self-correct
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
    /// Hint about what the correct usage looks like
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs_hint: Option<String>,
    /// Request ID for tracing and debugging
    #[serde(default)]
    pub request_id: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            tool: None,
            phase: None,
            field: None,
            received: None,
            details: None,
            schema: None,
            docs_hint: None,
            request_id: String::new(),
        }
    }
}

/// Error codes used across the tool server
pub mod codes {
    pub const TOOL_NOT_FOUND: &str = "tool_not_found";
    pub const POLICY_VIOLATION: &str = "policy_violation";
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const CONFIGURATION_ERROR: &str = "configuration_error";
    pub const MISSING_STORE: &str = "missing_store";
    pub const EXECUTION_FAILED: &str = "execution_failed";
    pub const INVALID_REQUEST: &str = "invalid_request";
    pub const INTERNAL_ERROR: &str = "internal_error";
}

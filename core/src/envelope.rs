use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::{ApiError, codes};

/// Lifecycle of a single dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPhase {
    Resolving,
    Validating,
    Executing,
    Completed,
}

impl DispatchPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            DispatchPhase::Resolving => "resolving",
            DispatchPhase::Validating => "validating",
            DispatchPhase::Executing => "executing",
            DispatchPhase::Completed => "completed",
        }
    }
}

/// Failure taxonomy of the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Unresolvable tool name; not retried.
    ToolNotFound,
    /// Direct call to a tool reserved for delegation.
    PolicyViolation,
    /// Arguments (after injection) do not match the tool schema.
    ValidationError,
    /// A declared injection cannot be satisfied from the state shape.
    ConfigurationError,
    /// Store-injected parameter but no store configured.
    MissingStore,
    /// The tool itself failed.
    ExecutionError,
    /// The request body could not be read.
    InvalidRequest,
}

impl FailureKind {
    pub fn code(self) -> &'static str {
        match self {
            FailureKind::ToolNotFound => codes::TOOL_NOT_FOUND,
            FailureKind::PolicyViolation => codes::POLICY_VIOLATION,
            FailureKind::ValidationError => codes::VALIDATION_FAILED,
            FailureKind::ConfigurationError => codes::CONFIGURATION_ERROR,
            FailureKind::MissingStore => codes::MISSING_STORE,
            FailureKind::ExecutionError => codes::EXECUTION_FAILED,
            FailureKind::InvalidRequest => codes::INVALID_REQUEST,
        }
    }

    /// Only an unknown tool maps to 404; every other failure is a 500.
    pub fn http_status(self) -> u16 {
        match self {
            FailureKind::ToolNotFound => 404,
            _ => 500,
        }
    }
}

/// Successful invocation body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ToolResponse {
    #[schema(value_type = Object)]
    pub data: Value,
}

/// Structured failure of one invocation.
#[derive(Debug, Clone)]
pub struct Failure {
    pub kind: FailureKind,
    pub body: ApiError,
}

impl Failure {
    pub fn new(kind: FailureKind, phase: DispatchPhase, message: impl Into<String>) -> Self {
        let mut body = ApiError::new(kind.code(), message);
        body.phase = Some(phase.as_str().to_string());
        Self { kind, body }
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.body.tool = Some(tool.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.body.field = Some(field.into());
        self
    }

    pub fn with_received(mut self, received: Value) -> Self {
        self.body.received = Some(received);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.body.details = Some(details);
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.body.schema = Some(schema);
        self
    }

    pub fn with_docs_hint(mut self, docs_hint: impl Into<String>) -> Self {
        self.body.docs_hint = Some(docs_hint.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.body.request_id = request_id.into();
        self
    }
}

/// Uniform outcome of a dispatch: exactly one of data or failure.
#[derive(Debug, Clone)]
pub enum Envelope {
    Completed(ToolResponse),
    Failed(Failure),
}

impl Envelope {
    pub fn completed(data: Value) -> Self {
        Envelope::Completed(ToolResponse { data })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Envelope::Completed(_))
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Envelope::Completed(_) => 200,
            Envelope::Failed(failure) => failure.kind.http_status(),
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Envelope::Completed(_) => None,
            Envelope::Failed(failure) => Some(failure.kind),
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            Envelope::Completed(response) => Some(&response.data),
            Envelope::Failed(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Envelope::Completed(response) => {
                serde_json::to_value(response).unwrap_or(Value::Null)
            }
            Envelope::Failed(failure) => serde_json::to_value(&failure.body).unwrap_or(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_tool_not_found_is_a_404() {
        assert_eq!(FailureKind::ToolNotFound.http_status(), 404);
        for kind in [
            FailureKind::PolicyViolation,
            FailureKind::ValidationError,
            FailureKind::ConfigurationError,
            FailureKind::MissingStore,
            FailureKind::ExecutionError,
            FailureKind::InvalidRequest,
        ] {
            assert_eq!(kind.http_status(), 500, "{kind:?}");
        }
    }

    #[test]
    fn failure_body_carries_phase_and_code() {
        let envelope = Envelope::Failed(
            Failure::new(
                FailureKind::ValidationError,
                DispatchPhase::Validating,
                "bad args",
            )
            .with_tool("echo")
            .with_schema(json!({"type": "object"})),
        );
        let body = envelope.to_value();
        assert_eq!(body["error"], "validation_failed");
        assert_eq!(body["phase"], "validating");
        assert_eq!(body["tool"], "echo");
        assert_eq!(body["schema"]["type"], "object");
        assert!(body.get("data").is_none());
    }

    #[test]
    fn completed_envelope_wraps_data_only() {
        let envelope = Envelope::completed(json!("hi"));
        assert_eq!(envelope.to_value(), json!({ "data": "hi" }));
        assert_eq!(envelope.http_status(), 200);
    }
}

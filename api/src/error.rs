use axum::Json;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use conductor_core::envelope::{DispatchPhase, Envelope, Failure, FailureKind};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request id set by the request-id layer, or a fresh one when the handler
/// runs without it (tests).
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::now_v7().to_string())
}

/// Outcome of one invocation, rendered as `200 {"data": ...}` or as a
/// structured failure body.
pub struct EnvelopeResponse {
    pub envelope: Envelope,
    pub request_id: String,
}

impl IntoResponse for EnvelopeResponse {
    fn into_response(self) -> Response {
        match self.envelope {
            Envelope::Completed(response) => (StatusCode::OK, Json(response)).into_response(),
            Envelope::Failed(failure) => failure_response(failure, self.request_id),
        }
    }
}

fn failure_response(failure: Failure, request_id: String) -> Response {
    let status = StatusCode::from_u16(failure.kind.http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = failure.with_request_id(request_id).body;
    (status, Json(body)).into_response()
}

/// Failures raised by the HTTP layer itself, before dispatch.
#[derive(Debug)]
pub enum AppError {
    /// Body missing or not a tool call (500, like every non-404 failure)
    InvalidRequest {
        tool: String,
        message: String,
        request_id: String,
    },
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::InvalidRequest {
                tool,
                message,
                request_id,
            } => {
                tracing::warn!(event = "invalid_request", tool = %tool, message = %message);
                let failure = Failure::new(FailureKind::InvalidRequest, DispatchPhase::Resolving, message)
                    .with_tool(tool)
                    .with_docs_hint(r#"Send a JSON body like {"kwargs": {...}, "thread_id": "..."}."#);
                failure_response(failure, request_id)
            }
        }
    }
}

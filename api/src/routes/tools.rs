use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use conductor_core::tools::{ToolCall, ToolCallRequest, ToolDescriptor};

use crate::error::{AppError, EnvelopeResponse, request_id};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tools", get(list_tools))
        .route("/{tool_name}", post(invoke_tool))
}

/// List every advertised tool
///
/// Helpers are callable but not listed.
#[utoipa::path(
    get,
    path = "/tools",
    responses(
        (status = 200, description = "Advertised tools", body = Vec<ToolDescriptor>)
    ),
    tag = "tools"
)]
pub async fn list_tools(State(state): State<AppState>) -> Json<Vec<ToolDescriptor>> {
    Json(state.registry().all())
}

/// Invoke a tool
///
/// Session state of `thread_id` (optionally pinned to `checkpoint_id`) is
/// injected into the parameters the tool declares as injected.
#[utoipa::path(
    post,
    path = "/{tool_name}",
    params(("tool_name" = String, Path, description = "Tool name; hyphens and underscores are interchangeable")),
    request_body = ToolCallRequest,
    responses(
        (status = 200, description = "Tool result under `data`", body = conductor_core::envelope::ToolResponse),
        (status = 404, description = "Unknown tool", body = conductor_core::error::ApiError),
        (status = 500, description = "Policy, validation, configuration or execution failure", body = conductor_core::error::ApiError)
    ),
    tag = "tools"
)]
pub async fn invoke_tool(
    State(state): State<AppState>,
    Path(tool_name): Path<String>,
    headers: HeaderMap,
    body: Result<Json<ToolCallRequest>, JsonRejection>,
) -> Response {
    let request_id = request_id(&headers);
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return AppError::InvalidRequest {
                tool: tool_name,
                message: rejection.body_text(),
                request_id,
            }
            .into_response();
        }
    };

    let call = ToolCall::from_request(tool_name, request_id.clone(), request);
    let envelope = state.dispatcher.dispatch(call).await;
    EnvelopeResponse {
        envelope,
        request_id,
    }
    .into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use conductor_runtime::builtin::register_builtins;
    use conductor_runtime::{Dispatcher, InMemoryKeyValueStore, InMemoryStateStore, StateResolver, ToolRegistry};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::routes::build_app;
    use crate::state::AppState;

    fn test_state(store: InMemoryStateStore) -> AppState {
        let registry = Arc::new(ToolRegistry::new());
        register_builtins(&registry).expect("builtins register");
        let dispatcher = Dispatcher::new(registry, StateResolver::new(Arc::new(store)))
            .with_store(Arc::new(InMemoryKeyValueStore::new()));
        AppState::new(Arc::new(dispatcher))
    }

    async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.expect("request should succeed");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should read");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request should build")
    }

    #[tokio::test]
    async fn echo_returns_data() {
        let app = build_app(test_state(InMemoryStateStore::new()));
        let (status, body) = send(app, post("/echo", json!({"kwargs": {"msg": "hi"}}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"data": "hi"}));
    }

    #[tokio::test]
    async fn whoami_injects_thread_state() {
        let store = InMemoryStateStore::new();
        store.put("t1", json!({"user": "alice"}));
        let app = build_app(test_state(store));

        let (status, body) = send(
            app.clone(),
            post("/whoami", json!({"kwargs": {}, "thread_id": "t1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!({"user": "alice"}));

        let (_, body) = send(app, post("/whoami", json!({"kwargs": {}}))).await;
        assert_eq!(body["data"], json!({}));
    }

    #[tokio::test]
    async fn unknown_tool_is_404_with_request_id() {
        let app = build_app(test_state(InMemoryStateStore::new()));
        let (status, body) = send(app, post("/nope", json!({"kwargs": {}}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "tool_not_found");
        assert!(!body["request_id"].as_str().unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn request_id_header_is_echoed_into_failures() {
        let app = build_app(test_state(InMemoryStateStore::new()));
        let mut request = post("/nope", json!({}));
        request
            .headers_mut()
            .insert("x-request-id", "req-123".parse().expect("valid header"));
        let response = app.oneshot(request).await.expect("request should succeed");
        assert_eq!(
            response.headers().get("x-request-id").expect("propagated header"),
            "req-123"
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should read");
        let body: Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(body["request_id"], "req-123");
    }

    #[tokio::test]
    async fn hyphenated_path_resolves_normalized_tool() {
        let app = build_app(test_state(InMemoryStateStore::new()));
        let (status, body) = send(app, post("/list-secrets", json!({"kwargs": {}}))).await;
        // Resolved, then fails on the missing `secrets` state key.
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "configuration_error");
    }

    #[tokio::test]
    async fn delegated_agent_is_policy_violation() {
        let app = build_app(test_state(InMemoryStateStore::new()));
        let (status, body) = send(
            app,
            post("/coder_agent", json!({"kwargs": {"task": "plot"}})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "policy_violation");
        assert!(body["message"].as_str().unwrap_or_default().contains("function_call"));
    }

    #[tokio::test]
    async fn wrong_argument_type_attaches_schema() {
        let app = build_app(test_state(InMemoryStateStore::new()));
        let (status, body) = send(app, post("/echo", json!({"kwargs": {"msg": 5}}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "validation_failed");
        assert_eq!(body["field"], "msg");
        assert_eq!(body["schema"]["parameters"]["required"], json!(["msg"]));
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_request() {
        let app = build_app(test_state(InMemoryStateStore::new()));
        let request = Request::builder()
            .method("POST")
            .uri("/echo")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .expect("request should build");
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "invalid_request");
    }

    #[tokio::test]
    async fn tools_lists_advertised_tools_only() {
        let app = build_app(test_state(InMemoryStateStore::new()));
        let request = Request::builder()
            .uri("/tools")
            .body(Body::empty())
            .expect("request should build");
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body
            .as_array()
            .expect("array body")
            .iter()
            .filter_map(|tool| tool["name"].as_str())
            .collect();
        assert!(names.contains(&"echo"));
        assert!(names.contains(&"email_agent"));
        assert!(!names.contains(&"sum_numbers"));
        assert!(body[0].get("parameters").is_some());
    }

    #[tokio::test]
    async fn helper_runs_with_raw_kwargs() {
        let app = build_app(test_state(InMemoryStateStore::new()));
        let (status, body) = send(app, post("/sum_numbers", json!({"kwargs": {"numbers": [1, 2]}}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"data": 3.0}));
    }

    #[tokio::test]
    async fn tool_client_round_trip_over_tcp() {
        let app = build_app(test_state(InMemoryStateStore::new()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        let client = conductor_runtime::ToolClient::new(&format!("http://{addr}")).expect("client");
        let tools = client.list_tools().await.expect("list tools");
        assert!(tools.iter().any(|t| t.name == "echo"));

        let mut request = conductor_core::tools::ToolCallRequest::default();
        request.kwargs.insert("msg".into(), json!("over the wire"));
        assert_eq!(
            client.call_tool("echo", &request).await.expect("call"),
            json!("over the wire")
        );

        match client.call_tool("missing", &request).await {
            Err(conductor_runtime::ClientError::Api { status, error }) => {
                assert_eq!(status, 404);
                assert_eq!(error.error, "tool_not_found");
            }
            other => panic!("expected 404, got {other:?}"),
        }
        let health = client.health().await.expect("health");
        assert_eq!(health["status"], "ok");
    }
}

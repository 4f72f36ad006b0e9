use axum::Router;
use axum::http::{HeaderName, Request};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::error::REQUEST_ID_HEADER;
use crate::state::AppState;

pub mod health;
pub mod tools;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Conductor Tool Server",
        version = "0.1.0",
        description = "Invoke named tools with arguments produced by a model. Session state is injected server-side; failures are structured so the model can retry."
    ),
    paths(
        health::health_check,
        tools::list_tools,
        tools::invoke_tool,
    ),
    components(schemas(
        health::HealthResponse,
        conductor_core::error::ApiError,
        conductor_core::envelope::ToolResponse,
        conductor_core::tools::ToolCallRequest,
        conductor_core::tools::ToolDescriptor,
    ))
)]
pub struct ApiDoc;

/// Time-ordered request ids, matching the call ids the dispatcher generates.
#[derive(Clone, Copy, Default)]
struct MakeRequestV7;

impl MakeRequestId for MakeRequestV7 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        uuid::Uuid::now_v7()
            .to_string()
            .parse()
            .ok()
            .map(RequestId::new)
    }
}

pub fn build_app(state: AppState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    // Static routes first in matching precedence: `/tools` and `/health`
    // shadow tools of the same name.
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(health::router())
        .merge(tools::router())
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestV7))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(request_id)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_documents_every_endpoint() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/tools"));
        assert!(paths.iter().any(|p| p.as_str() == "/health"));
        assert!(paths.iter().any(|p| p.as_str() == "/{tool_name}"));
    }
}

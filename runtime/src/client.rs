//! Typed HTTP client of the tool server, used by the CLI and by
//! orchestration code that calls tools from outside the server process.

use std::time::Duration;

use conductor_core::error::{ApiError, codes};
use conductor_core::tools::{ToolCallRequest, ToolDescriptor};
use reqwest::Method;
use serde_json::Value;
use url::Url;

use crate::util::{http_client, parse_response_body};

const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid server url: {0}")]
    InvalidUrl(String),
    #[error("failed to reach tool server at {url}: {message}")]
    Connection { url: String, message: String },
    #[error("tool server returned HTTP {status}: {}", .error.message)]
    Api { status: u16, error: ApiError },
    #[error("unexpected response from tool server: {0}")]
    Decode(String),
}

/// Raw status and body of a server response.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Value,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn into_api_error(self) -> ClientError {
        let error = serde_json::from_value::<ApiError>(self.body.clone()).unwrap_or_else(|_| {
            let message = match &self.body {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            ApiError::new(codes::INTERNAL_ERROR, message)
        });
        ClientError::Api {
            status: self.status,
            error,
        }
    }
}

#[derive(Clone)]
pub struct ToolClient {
    base_url: Url,
    http: reqwest::Client,
}

impl ToolClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url.trim()).map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            base_url,
            http: http_client(timeout),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, segment: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(segment);
        }
        url
    }

    /// Send a request and return status and body without interpreting them.
    pub async fn raw(&self, method: Method, segment: &str, body: Option<&Value>) -> Result<RawResponse, ClientError> {
        let url = self.url(segment);
        let mut request = self.http.request(method, url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(|e| ClientError::Connection {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::Decode(format!("failed to read response body: {e}")))?;
        Ok(RawResponse {
            status,
            body: parse_response_body(&bytes),
        })
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ClientError> {
        let response = self.raw(Method::GET, "tools", None).await?;
        if !response.is_success() {
            return Err(response.into_api_error());
        }
        serde_json::from_value(response.body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Invoke a tool; returns the `data` of a successful call.
    pub async fn call_tool(&self, name: &str, request: &ToolCallRequest) -> Result<Value, ClientError> {
        let body = serde_json::to_value(request).map_err(|e| ClientError::Decode(e.to_string()))?;
        let response = self.raw(Method::POST, name, Some(&body)).await?;
        decode_call_response(response)
    }

    pub async fn health(&self) -> Result<Value, ClientError> {
        let response = self.raw(Method::GET, "health", None).await?;
        if !response.is_success() {
            return Err(response.into_api_error());
        }
        Ok(response.body)
    }
}

fn decode_call_response(mut response: RawResponse) -> Result<Value, ClientError> {
    if !response.is_success() {
        return Err(response.into_api_error());
    }
    match response.body.get_mut("data") {
        Some(data) => Ok(data.take()),
        None => Err(ClientError::Decode(format!(
            "successful response without 'data': {}",
            response.body
        ))),
    }
}

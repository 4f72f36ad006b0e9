//! Session state retrieval.
//!
//! The orchestration engine owns conversation state; the tool server reads
//! snapshots of it per call. Retrieval is fail-open: a call without a thread,
//! an unknown thread, or a broken store all produce an empty state, and the
//! tool runs anyway. The distinction between those outcomes is kept in
//! [`StateFetch`] so callers can log or surface it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use url::Url;

use crate::util::{http_client, parse_response_body};

/// Snapshot of one thread's state: normally a mapping, occasionally a bare
/// message sequence for graphs whose state is a list.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState(Value);

impl Default for SessionState {
    fn default() -> Self {
        Self::empty()
    }
}

impl SessionState {
    pub fn empty() -> Self {
        SessionState(Value::Object(Map::new()))
    }

    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Self::empty(),
            other => SessionState(other),
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn is_sequence(&self) -> bool {
        self.0.is_array()
    }

    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Object(map) => map.is_empty(),
            Value::Array(items) => items.is_empty(),
            _ => false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.as_object().and_then(|map| map.get(key))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateStoreError {
    #[error("thread '{thread_id}' not found")]
    NotFound { thread_id: String },
    #[error("state store unavailable: {0}")]
    Unavailable(String),
    #[error("malformed state response: {0}")]
    Malformed(String),
}

/// External source of thread state snapshots.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get_state(
        &self,
        thread_id: &str,
        checkpoint_id: Option<&str>,
    ) -> Result<SessionState, StateStoreError>;
}

/// Reads `GET {base}/threads/{thread_id}/state[/{checkpoint_id}]` and takes
/// the snapshot from its `values` field.
pub struct HttpStateStore {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpStateStore {
    pub fn new(base_url: Url, timeout: Duration) -> Self {
        Self {
            base_url,
            http: http_client(timeout),
        }
    }

    fn state_url(&self, thread_id: &str, checkpoint_id: Option<&str>) -> Result<Url, StateStoreError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                StateStoreError::Unavailable(format!("invalid state store base url '{}'", self.base_url))
            })?;
            segments.pop_if_empty().extend(["threads", thread_id, "state"]);
            if let Some(checkpoint_id) = checkpoint_id {
                segments.push(checkpoint_id);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl StateStore for HttpStateStore {
    async fn get_state(
        &self,
        thread_id: &str,
        checkpoint_id: Option<&str>,
    ) -> Result<SessionState, StateStoreError> {
        let url = self.state_url(thread_id, checkpoint_id)?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| StateStoreError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StateStoreError::NotFound {
                thread_id: thread_id.to_string(),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StateStoreError::Unavailable(e.to_string()))?;
        if !status.is_success() {
            return Err(StateStoreError::Unavailable(format!(
                "HTTP {}: {}",
                status.as_u16(),
                parse_response_body(&bytes)
            )));
        }

        let body: Value = serde_json::from_slice(&bytes)
            .map_err(|e| StateStoreError::Malformed(e.to_string()))?;
        match body.get("values") {
            Some(values @ (Value::Object(_) | Value::Array(_) | Value::Null)) => {
                Ok(SessionState::from_value(values.clone()))
            }
            Some(other) => Err(StateStoreError::Malformed(format!(
                "'values' must be an object or a list, got {other}"
            ))),
            None => Err(StateStoreError::Malformed(
                "snapshot has no 'values' field".to_string(),
            )),
        }
    }
}

#[derive(Debug, Default)]
struct ThreadHistory {
    latest: Option<Value>,
    checkpoints: HashMap<String, Value>,
}

/// Process-local state store for tests and single-node development.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    threads: RwLock<HashMap<String, ThreadHistory>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, thread_id: &str, values: Value) {
        let mut threads = self.threads.write().unwrap_or_else(|e| e.into_inner());
        threads.entry(thread_id.to_string()).or_default().latest = Some(values);
    }

    pub fn put_checkpoint(&self, thread_id: &str, checkpoint_id: &str, values: Value) {
        let mut threads = self.threads.write().unwrap_or_else(|e| e.into_inner());
        threads
            .entry(thread_id.to_string())
            .or_default()
            .checkpoints
            .insert(checkpoint_id.to_string(), values);
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get_state(
        &self,
        thread_id: &str,
        checkpoint_id: Option<&str>,
    ) -> Result<SessionState, StateStoreError> {
        let threads = self.threads.read().unwrap_or_else(|e| e.into_inner());
        let not_found = || StateStoreError::NotFound {
            thread_id: thread_id.to_string(),
        };
        let history = threads.get(thread_id).ok_or_else(not_found)?;
        let values = match checkpoint_id {
            Some(checkpoint_id) => history.checkpoints.get(checkpoint_id),
            None => history.latest.as_ref(),
        };
        values
            .cloned()
            .map(SessionState::from_value)
            .ok_or_else(not_found)
    }
}

/// Outcome of a state fetch, before collapsing to a (possibly empty) state.
#[derive(Debug, Clone, PartialEq)]
pub enum StateFetch {
    /// The call was not scoped to a thread; nothing was fetched.
    NoThread,
    Found(SessionState),
    NotFound,
    Failed(String),
}

impl StateFetch {
    pub fn into_state(self) -> SessionState {
        match self {
            StateFetch::Found(state) => state,
            StateFetch::NoThread | StateFetch::NotFound | StateFetch::Failed(_) => {
                SessionState::empty()
            }
        }
    }
}

/// Fail-open front of a [`StateStore`].
#[derive(Clone)]
pub struct StateResolver {
    store: Arc<dyn StateStore>,
}

impl StateResolver {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub async fn fetch(&self, thread_id: Option<&str>, checkpoint_id: Option<&str>) -> SessionState {
        self.fetch_detailed(thread_id, checkpoint_id)
            .await
            .into_state()
    }

    pub async fn fetch_detailed(
        &self,
        thread_id: Option<&str>,
        checkpoint_id: Option<&str>,
    ) -> StateFetch {
        let Some(thread_id) = thread_id.filter(|id| !id.trim().is_empty()) else {
            return StateFetch::NoThread;
        };
        match self.store.get_state(thread_id, checkpoint_id).await {
            Ok(state) => StateFetch::Found(state),
            Err(StateStoreError::NotFound { .. }) => {
                tracing::debug!(
                    event = "state_not_found",
                    thread_id = %thread_id,
                    checkpoint_id = ?checkpoint_id,
                    "no state for thread, continuing with empty state"
                );
                StateFetch::NotFound
            }
            Err(e) => {
                tracing::warn!(
                    event = "state_fetch_failed",
                    thread_id = %thread_id,
                    checkpoint_id = ?checkpoint_id,
                    error = %e,
                    "state fetch failed, continuing with empty state"
                );
                StateFetch::Failed(e.to_string())
            }
        }
    }
}

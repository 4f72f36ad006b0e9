use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use conductor_core::tools::{InjectedParam, ToolDescriptor};
use serde_json::{Map, Value, json};

use crate::legacy::ToolSignature;
use crate::store::KeyValueStore;

/// Thread scope handed to a tool when the call carries a thread id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub thread_id: String,
    pub checkpoint_id: Option<String>,
}

impl RunConfig {
    pub fn to_value(&self) -> Value {
        json!({
            "configurable": {
                "thread_id": self.thread_id,
                "checkpoint_id": self.checkpoint_id,
            }
        })
    }
}

/// Everything a tool receives for one execution.
#[derive(Clone, Default)]
pub struct ToolInput {
    pub call_id: String,
    /// Model arguments merged with injected values.
    pub args: Map<String, Value>,
    /// Present only when the call was scoped to a thread.
    pub config: Option<RunConfig>,
    /// Present only when the tool declares a store parameter.
    pub store: Option<Arc<dyn KeyValueStore>>,
}

impl std::fmt::Debug for ToolInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolInput")
            .field("call_id", &self.call_id)
            .field("args", &self.args)
            .field("config", &self.config)
            .field("store", &self.store.is_some())
            .finish()
    }
}

impl ToolInput {
    pub fn from_args(args: Map<String, Value>) -> Self {
        Self {
            args,
            ..Self::default()
        }
    }

    pub fn required_str(&self, key: &str) -> Result<&str, ToolError> {
        match self.args.get(key) {
            Some(Value::String(v)) => Ok(v.as_str()),
            Some(_) => Err(ToolError::invalid_argument(
                key,
                format!("'{key}' must be a string"),
            )),
            None => Err(ToolError::invalid_argument(
                key,
                format!("Missing required field '{key}'"),
            )),
        }
    }

    pub fn store(&self) -> Result<&Arc<dyn KeyValueStore>, ToolError> {
        self.store
            .as_ref()
            .ok_or_else(|| ToolError::Failed("no key-value store attached to this call".into()))
    }
}

/// Failure raised by a tool implementation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolError {
    #[error("{message}")]
    InvalidArgument { field: String, message: String },
    #[error("{message}")]
    Provider {
        message: String,
        details: Option<Value>,
    },
    #[error("{0}")]
    Failed(String),
}

impl ToolError {
    pub fn invalid_argument(field: impl Into<String>, message: impl Into<String>) -> Self {
        ToolError::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn provider(message: impl Into<String>, details: Option<Value>) -> Self {
        ToolError::Provider {
            message: message.into(),
            details,
        }
    }
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, input: ToolInput) -> Result<Value, ToolError>;
}

/// Adapts an async closure into a [`ToolHandler`].
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(ToolInput) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
{
    async fn call(&self, input: ToolInput) -> Result<Value, ToolError> {
        (self.0)(input).await
    }
}

#[derive(Clone)]
enum ToolImpl {
    Handler(Arc<dyn ToolHandler>),
    /// Sub-agent run by the orchestration graph; advertised, never executed here.
    Delegated,
}

/// A registered tool: advertisement, injection declaration and implementation.
#[derive(Clone)]
pub struct Tool {
    pub descriptor: ToolDescriptor,
    /// Explicit injection declaration. Empty means "fall back to the signature".
    pub injected: Vec<InjectedParam>,
    pub store_param: Option<String>,
    pub signature: Option<ToolSignature>,
    /// Environment variables that must be set for the tool to be registered.
    pub required_env: Vec<String>,
    implementation: ToolImpl,
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.descriptor.name)
            .field("injected", &self.injected)
            .field("store_param", &self.store_param)
            .field("delegated", &self.is_delegated())
            .finish()
    }
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            descriptor: ToolDescriptor {
                name: name.into(),
                description: description.into(),
                parameters,
            },
            injected: Vec::new(),
            store_param: None,
            signature: None,
            required_env: Vec::new(),
            implementation: ToolImpl::Handler(handler),
        }
    }

    pub fn from_fn<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        f: F,
    ) -> Self
    where
        F: Fn(ToolInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        Self::new(name, description, parameters, Arc::new(FnHandler(f)))
    }

    pub fn delegated(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            descriptor: ToolDescriptor {
                name: name.into(),
                description: description.into(),
                parameters,
            },
            injected: Vec::new(),
            store_param: None,
            signature: None,
            required_env: Vec::new(),
            implementation: ToolImpl::Delegated,
        }
    }

    pub fn with_injected(mut self, param: InjectedParam) -> Self {
        self.injected.push(param);
        self
    }

    pub fn with_store_param(mut self, param: impl Into<String>) -> Self {
        self.store_param = Some(param.into());
        self
    }

    pub fn with_signature(mut self, signature: ToolSignature) -> Self {
        self.signature = Some(signature);
        self
    }

    pub fn requires_env(mut self, var: impl Into<String>) -> Self {
        self.required_env.push(var.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn is_delegated(&self) -> bool {
        matches!(self.implementation, ToolImpl::Delegated)
    }

    pub fn handler(&self) -> Option<Arc<dyn ToolHandler>> {
        match &self.implementation {
            ToolImpl::Handler(handler) => Some(handler.clone()),
            ToolImpl::Delegated => None,
        }
    }

    /// First required environment variable that is not set, if any.
    pub fn missing_env(&self) -> Option<&str> {
        self.required_env
            .iter()
            .find(|var| std::env::var(var).map(|v| v.is_empty()).unwrap_or(true))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn fn_handler_runs_closure() {
        let tool = Tool::from_fn("echo", "", json!({"type": "object"}), |input| async move {
            Ok(input.args.get("msg").cloned().unwrap_or(Value::Null))
        });
        let handler = tool.handler().expect("local tool has a handler");
        let mut args = Map::new();
        args.insert("msg".into(), json!("hi"));
        let out = handler.call(ToolInput::from_args(args)).await.unwrap();
        assert_eq!(out, json!("hi"));
    }

    #[test]
    fn delegated_tools_have_no_handler() {
        let tool = Tool::delegated("coder_agent", "", json!({"type": "object"}));
        assert!(tool.is_delegated());
        assert!(tool.handler().is_none());
    }

    #[test]
    fn required_str_reports_field() {
        let input = ToolInput::from_args(Map::new());
        match input.required_str("msg") {
            Err(ToolError::InvalidArgument { field, .. }) => assert_eq!(field, "msg"),
            other => panic!("expected invalid argument, got {other:?}"),
        }
    }

    #[test]
    fn missing_env_detects_unset_variable() {
        let tool = Tool::from_fn("t", "", json!({}), |_| async { Ok(Value::Null) })
            .requires_env("CONDUCTOR_TEST_SURELY_UNSET_VARIABLE");
        assert_eq!(tool.missing_env(), Some("CONDUCTOR_TEST_SURELY_UNSET_VARIABLE"));
    }
}

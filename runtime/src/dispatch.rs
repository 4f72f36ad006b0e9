//! Invocation dispatch.
//!
//! `dispatch` takes a tool call through `resolving -> validating -> executing`
//! and ends in exactly one envelope. Nothing below this boundary escapes as an
//! error or a panic: unknown tools, reserved tools, injection problems, schema
//! mismatches and tool failures all become structured [`Failure`]s.

use std::any::Any;
use std::collections::BTreeSet;
use std::sync::Arc;

use conductor_core::envelope::{DispatchPhase, Envelope, Failure, FailureKind};
use conductor_core::tools::{ToolCall, normalize_tool_name};
use serde_json::json;
use uuid::Uuid;

use crate::inject::{InjectionError, attach_store, inject, injected_names};
use crate::registry::{Resolved, ToolRegistry};
use crate::schema::{diagnose, validate_args, violations_to_value};
use crate::state::StateResolver;
use crate::store::KeyValueStore;
use crate::tool::{RunConfig, Tool, ToolError, ToolInput};

pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    resolver: StateResolver,
    store: Option<Arc<dyn KeyValueStore>>,
    reserved: BTreeSet<String>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>, resolver: StateResolver) -> Self {
        Self {
            registry,
            resolver,
            store: None,
            reserved: BTreeSet::new(),
        }
    }

    /// Key-value store handed to tools that declare a store parameter.
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Extra names that must only be reached through function-call
    /// delegation. Delegated tools are always reserved.
    pub fn with_reserved<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.reserved
            .extend(names.into_iter().map(|n| normalize_tool_name(n.as_ref())));
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn is_reserved(&self, tool: &Tool) -> bool {
        tool.is_delegated() || self.reserved.contains(tool.name())
    }

    pub async fn dispatch(&self, mut call: ToolCall) -> Envelope {
        if call.call_id.is_empty() {
            call.call_id = Uuid::now_v7().to_string();
        }
        enter(&call, DispatchPhase::Resolving);

        let envelope = match self.registry.resolve(&call.name) {
            None => Envelope::Failed(self.not_found(&call.name)),
            Some(Resolved::Helper(tool)) | Some(Resolved::Tool(tool)) if self.is_reserved(&tool) => {
                Envelope::Failed(policy_violation(&tool))
            }
            Some(Resolved::Helper(tool)) => {
                let input = ToolInput {
                    call_id: call.call_id.clone(),
                    args: call.args.clone(),
                    config: None,
                    store: None,
                };
                enter(&call, DispatchPhase::Executing);
                execute(&tool, input).await
            }
            Some(Resolved::Tool(tool)) => self.run_tool(&tool, &call).await,
        };

        match &envelope {
            Envelope::Completed(_) => enter(&call, DispatchPhase::Completed),
            Envelope::Failed(failure) => tracing::warn!(
                event = "tool_call_failed",
                tool = %call.name,
                call_id = %call.call_id,
                phase = failure.body.phase.as_deref().unwrap_or_default(),
                error = failure.kind.code(),
                message = %failure.body.message,
                "tool call failed"
            ),
        }
        envelope
    }

    async fn run_tool(&self, tool: &Tool, call: &ToolCall) -> Envelope {
        enter(call, DispatchPhase::Validating);
        let state = self
            .resolver
            .fetch(call.thread_id.as_deref(), call.checkpoint_id.as_deref())
            .await;

        let args = match inject(tool, call.args.clone(), &state) {
            Ok(args) => args,
            Err(e) => return Envelope::Failed(injection_failure(tool, e)),
        };
        let store = match attach_store(tool, self.store.as_ref()) {
            Ok(store) => store,
            Err(e) => return Envelope::Failed(injection_failure(tool, e)),
        };

        let violations = validate_args(&tool.descriptor.parameters, &args, &injected_names(tool));
        if !violations.is_empty() {
            let mut failure = Failure::new(
                FailureKind::ValidationError,
                DispatchPhase::Validating,
                diagnose(tool.name(), &violations),
            )
            .with_tool(tool.name())
            .with_schema(tool.descriptor.to_value())
            .with_details(json!({ "violations": violations_to_value(&violations) }))
            .with_docs_hint("Fill in the arguments according to the attached schema and call the tool again.");
            if let Some(first) = violations.first() {
                if let Some(field) = first.field() {
                    failure = failure.with_field(field);
                }
                if let Some(received) = &first.received {
                    failure = failure.with_received(received.clone());
                }
            }
            return Envelope::Failed(failure);
        }

        let input = ToolInput {
            call_id: call.call_id.clone(),
            args,
            config: call.thread_id.clone().map(|thread_id| RunConfig {
                thread_id,
                checkpoint_id: call.checkpoint_id.clone(),
            }),
            store,
        };
        enter(call, DispatchPhase::Executing);
        execute(tool, input).await
    }

    fn not_found(&self, name: &str) -> Failure {
        let mut failure = Failure::new(
            FailureKind::ToolNotFound,
            DispatchPhase::Resolving,
            format!("Tool with name {name} not found!"),
        )
        .with_tool(name);
        failure = match self.registry.closest(name) {
            Some(candidate) => failure.with_docs_hint(format!(
                "Did you mean '{candidate}'? GET /tools lists the available tools."
            )),
            None => failure.with_docs_hint("GET /tools lists the available tools."),
        };
        failure
    }
}

fn enter(call: &ToolCall, phase: DispatchPhase) {
    tracing::debug!(
        event = "dispatch_phase",
        tool = %call.name,
        call_id = %call.call_id,
        thread_id = call.thread_id.as_deref().unwrap_or_default(),
        phase = phase.as_str(),
        "dispatch phase"
    );
}

fn policy_violation(tool: &Tool) -> Failure {
    let name = tool.name();
    Failure::new(
        FailureKind::PolicyViolation,
        DispatchPhase::Resolving,
        format!("Tried to call '{name}'. '{name}' must not be called from code! Invoke it via function_call"),
    )
    .with_tool(name)
    .with_docs_hint("Delegated agents run only through the orchestration graph's function calling.")
}

fn injection_failure(tool: &Tool, error: InjectionError) -> Failure {
    let kind = match &error {
        InjectionError::Configuration { .. } => FailureKind::ConfigurationError,
        InjectionError::MissingStore { .. } => FailureKind::MissingStore,
    };
    Failure::new(kind, DispatchPhase::Validating, error.to_string())
        .with_tool(tool.name())
        .with_field(error.param())
}

/// Run the handler on its own task so a panicking tool fails the call, not
/// the server.
async fn execute(tool: &Tool, input: ToolInput) -> Envelope {
    let Some(handler) = tool.handler() else {
        return Envelope::Failed(policy_violation(tool));
    };
    let name = tool.name().to_string();

    match tokio::spawn(async move { handler.call(input).await }).await {
        Ok(Ok(data)) => Envelope::completed(data),
        Ok(Err(error)) => Envelope::Failed(tool_error_failure(&name, error)),
        Err(join_error) => {
            let reason = if join_error.is_panic() {
                panic_message(join_error.into_panic())
            } else {
                "tool task was cancelled".to_string()
            };
            tracing::error!(event = "tool_panicked", tool = %name, reason = %reason);
            Envelope::Failed(
                Failure::new(
                    FailureKind::ExecutionError,
                    DispatchPhase::Executing,
                    format!("Error: tool '{name}' crashed: {reason}\n Please fix your mistakes."),
                )
                .with_tool(name),
            )
        }
    }
}

fn tool_error_failure(name: &str, error: ToolError) -> Failure {
    let failure = Failure::new(
        FailureKind::ExecutionError,
        DispatchPhase::Executing,
        format!("Error: {error}\n Please fix your mistakes."),
    )
    .with_tool(name);
    match error {
        ToolError::InvalidArgument { field, .. } => failure.with_field(field),
        ToolError::Provider {
            details: Some(details),
            ..
        } => failure.with_details(details),
        ToolError::Provider { details: None, .. } | ToolError::Failed(_) => failure,
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

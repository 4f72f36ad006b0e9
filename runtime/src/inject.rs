//! Argument injection.
//!
//! Merges the arguments a model produced with values drawn from session
//! state, according to the tool's injection declaration. Injected values are
//! authoritative: a model-supplied value under an injected name is replaced.
//!
//! Tools without an explicit declaration fall back to signature inspection
//! ([`crate::legacy`]).

use std::sync::Arc;

use conductor_core::tools::{InjectedParam, MESSAGES_KEY};
use serde_json::{Map, Value, json};

use crate::legacy::{DiscoveredInjection, discover_injected};
use crate::state::SessionState;
use crate::store::KeyValueStore;
use crate::tool::Tool;
use crate::util::json_type_name;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InjectionError {
    /// The declaration cannot be satisfied from the state's shape. This is a
    /// defect in the tool or graph wiring, not something the model can fix.
    #[error("{message}")]
    Configuration { param: String, message: String },
    #[error("tool expects a key-value store in parameter '{param}' but none is configured")]
    MissingStore { param: String },
}

impl InjectionError {
    pub fn param(&self) -> &str {
        match self {
            InjectionError::Configuration { param, .. } | InjectionError::MissingStore { param } => {
                param
            }
        }
    }
}

/// Effective injection declaration: the explicit one, or the one discovered
/// from the legacy signature when nothing is declared.
pub fn declared_injections(tool: &Tool) -> DiscoveredInjection {
    if !tool.injected.is_empty() || tool.store_param.is_some() {
        return DiscoveredInjection {
            state: tool.injected.clone(),
            store: tool.store_param.clone(),
        };
    }
    match &tool.signature {
        Some(signature) => discover_injected(signature),
        None => DiscoveredInjection::default(),
    }
}

/// Names the model must not be validated against: state- and store-injected.
pub fn injected_names(tool: &Tool) -> Vec<String> {
    let declared = declared_injections(tool);
    declared
        .state
        .into_iter()
        .map(|spec| spec.param)
        .chain(declared.store)
        .collect()
}

/// Complete argument set for one call.
pub fn inject(
    tool: &Tool,
    raw_args: Map<String, Value>,
    state: &SessionState,
) -> Result<Map<String, Value>, InjectionError> {
    let declared = declared_injections(tool);
    let mut args = raw_args;
    if let Some(param) = &declared.store {
        if args.remove(param).is_some() {
            tracing::debug!(
                tool = %tool.name(),
                param = %param,
                "model-supplied value for store parameter dropped"
            );
        }
    }
    if declared.state.is_empty() {
        return Ok(args);
    }

    let lifted;
    let state = if state.is_sequence() {
        lifted = lift_sequence(&declared.state, state)?;
        &lifted
    } else {
        state.as_value()
    };

    for spec in &declared.state {
        let value = injected_value(spec, state)?;
        if args.contains_key(&spec.param) {
            tracing::debug!(
                tool = %tool.name(),
                param = %spec.param,
                "model-supplied value replaced by injected value"
            );
        }
        args.insert(spec.param.clone(), value);
    }
    Ok(args)
}

/// The store handed to the tool, or [`InjectionError::MissingStore`] when the
/// tool declares a store parameter and the invocation has none.
pub fn attach_store(
    tool: &Tool,
    store: Option<&Arc<dyn KeyValueStore>>,
) -> Result<Option<Arc<dyn KeyValueStore>>, InjectionError> {
    match (declared_injections(tool).store, store) {
        (None, _) => Ok(None),
        (Some(_), Some(store)) => Ok(Some(store.clone())),
        (Some(param), None) => Err(InjectionError::MissingStore { param }),
    }
}

/// A sequence state is read as `{messages: [...]}` when the first injection
/// takes the whole state, or when the only injection takes the messages.
/// Other keys requested alongside still fail when they are looked up.
fn lift_sequence(specs: &[InjectedParam], state: &SessionState) -> Result<Value, InjectionError> {
    let whole_first = specs.first().is_some_and(|spec| spec.state_key.is_none());
    let only_messages = matches!(specs, [only] if only.state_key.as_deref() == Some(MESSAGES_KEY));
    if whole_first || only_messages {
        return Ok(json!({ MESSAGES_KEY: state.as_value().clone() }));
    }
    let spec = specs
        .iter()
        .find(|spec| spec.state_key.is_some() && spec.state_key.as_deref() != Some(MESSAGES_KEY))
        .unwrap_or(&specs[0]);
    Err(InjectionError::Configuration {
        param: spec.param.clone(),
        message: format!(
            "Session state is a message list, but the tool injects {} parameters ({}). \
             A list state is only readable as the whole state (first injected parameter) or as '{MESSAGES_KEY}' alone.",
            specs.len(),
            describe(specs)
        ),
    })
}

fn injected_value(spec: &InjectedParam, state: &Value) -> Result<Value, InjectionError> {
    let Some(map) = state.as_object() else {
        return Err(InjectionError::Configuration {
            param: spec.param.clone(),
            message: format!(
                "Session state must be an object to inject '{}', got {}",
                spec.param,
                json_type_name(state)
            ),
        });
    };
    match &spec.state_key {
        None => Ok(state.clone()),
        Some(key) => map.get(key).cloned().ok_or_else(|| {
            let mut available: Vec<&str> = map.keys().map(String::as_str).collect();
            available.sort_unstable();
            InjectionError::Configuration {
                param: spec.param.clone(),
                message: format!(
                    "Parameter '{}' is injected from state key '{key}', which the session state does not contain (available keys: [{}])",
                    spec.param,
                    available.join(", ")
                ),
            }
        }),
    }
}

fn describe(specs: &[InjectedParam]) -> String {
    specs
        .iter()
        .map(|spec| match &spec.state_key {
            Some(key) => format!("{} <- state['{key}']", spec.param),
            None => format!("{} <- state", spec.param),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::legacy::{AnnotationMarker, ParamAnnotation, ToolSignature};
    use crate::store::InMemoryKeyValueStore;

    fn tool() -> Tool {
        Tool::from_fn("t", "", json!({"type": "object"}), |_| async { Ok(Value::Null) })
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn no_declaration_returns_args_unchanged() {
        let raw = args(json!({"msg": "hi", "state": "model"}));
        for state in [
            SessionState::empty(),
            SessionState::from_value(json!({"user": "alice"})),
            SessionState::from_value(json!([1, 2])),
        ] {
            assert_eq!(inject(&tool(), raw.clone(), &state).unwrap(), raw);
        }
    }

    #[test]
    fn whole_state_injection_ignores_model_value() {
        let tool = tool().with_injected(InjectedParam::whole_state("state"));
        let state = SessionState::from_value(json!({"user": "alice"}));
        let out = inject(&tool, args(json!({"state": "forged", "q": 1})), &state).unwrap();
        assert_eq!(out["state"], json!({"user": "alice"}));
        assert_eq!(out["q"], json!(1));
    }

    #[test]
    fn keyed_injection_with_missing_key_is_configuration_error() {
        let tool = tool().with_injected(InjectedParam::state_field("secrets", "secrets"));
        let state = SessionState::from_value(json!({"user": "alice"}));
        let err = inject(&tool, Map::new(), &state).unwrap_err();
        match err {
            InjectionError::Configuration { param, message } => {
                assert_eq!(param, "secrets");
                assert!(message.contains("available keys: [user]"), "{message}");
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn sequence_state_is_lifted_for_single_messages_injection() {
        let state = SessionState::from_value(json!([{"role": "user", "content": "hi"}]));

        let whole = tool().with_injected(InjectedParam::whole_state("state"));
        let out = inject(&whole, Map::new(), &state).unwrap();
        assert_eq!(out["state"], json!({"messages": [{"role": "user", "content": "hi"}]}));

        let keyed = tool().with_injected(InjectedParam::state_field("history", "messages"));
        let out = inject(&keyed, Map::new(), &state).unwrap();
        assert_eq!(out["history"], json!([{"role": "user", "content": "hi"}]));
    }

    #[test]
    fn sequence_state_rejects_named_fields() {
        let state = SessionState::from_value(json!([]));
        let keyed = tool().with_injected(InjectedParam::state_field("user", "user"));
        assert!(matches!(
            inject(&keyed, Map::new(), &state),
            Err(InjectionError::Configuration { ref param, .. }) if param == "user"
        ));

        let history_then_user = tool()
            .with_injected(InjectedParam::state_field("history", "messages"))
            .with_injected(InjectedParam::state_field("user", "user"));
        assert!(matches!(
            inject(&history_then_user, Map::new(), &state),
            Err(InjectionError::Configuration { .. })
        ));
    }

    #[test]
    fn sequence_state_feeds_whole_state_and_messages_together() {
        let state = SessionState::from_value(json!([{"role": "user"}]));
        let both = tool()
            .with_injected(InjectedParam::whole_state("state"))
            .with_injected(InjectedParam::state_field("history", "messages"));
        let out = inject(&both, Map::new(), &state).unwrap();
        assert_eq!(out["state"], json!({"messages": [{"role": "user"}]}));
        assert_eq!(out["history"], json!([{"role": "user"}]));

        let whole_then_user = tool()
            .with_injected(InjectedParam::whole_state("state"))
            .with_injected(InjectedParam::state_field("user", "user"));
        match inject(&whole_then_user, Map::new(), &state) {
            Err(InjectionError::Configuration { param, message }) => {
                assert_eq!(param, "user");
                assert!(message.contains("available keys: [messages]"), "{message}");
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn model_cannot_supply_the_store_parameter() {
        let with_store = tool().with_store_param("store");
        let out = inject(
            &with_store,
            args(json!({"store": "forged", "key": "k"})),
            &SessionState::empty(),
        )
        .unwrap();
        assert_eq!(out.get("store"), None);
        assert_eq!(out["key"], json!("k"));
    }

    #[test]
    fn legacy_signature_is_used_without_declaration() {
        let tool = tool().with_signature(
            ToolSignature::new()
                .param("query", ParamAnnotation::Type("str".into()))
                .param(
                    "state",
                    ParamAnnotation::annotated(
                        ParamAnnotation::Type("dict".into()),
                        vec![AnnotationMarker::InjectedState],
                    ),
                ),
        );
        let state = SessionState::from_value(json!({"user": "bob"}));
        let out = inject(&tool, args(json!({"query": "x"})), &state).unwrap();
        assert_eq!(out["state"], json!({"user": "bob"}));
        assert_eq!(injected_names(&tool), vec!["state".to_string()]);
    }

    #[test]
    fn explicit_declaration_shadows_legacy_signature() {
        let tool = tool()
            .with_injected(InjectedParam::state_field("user", "user"))
            .with_signature(
                ToolSignature::new()
                    .param("state", ParamAnnotation::Marker(AnnotationMarker::InjectedState)),
            );
        let state = SessionState::from_value(json!({"user": "bob"}));
        let out = inject(&tool, Map::new(), &state).unwrap();
        assert_eq!(out.get("state"), None);
        assert_eq!(out["user"], json!("bob"));
    }

    #[test]
    fn store_parameter_requires_a_store() {
        let with_store = tool().with_store_param("store");
        assert!(matches!(
            attach_store(&with_store, None),
            Err(InjectionError::MissingStore { ref param }) if param == "store"
        ));
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryKeyValueStore::new());
        assert!(attach_store(&with_store, Some(&store)).unwrap().is_some());
        assert!(attach_store(&tool(), Some(&store)).unwrap().is_none());
    }
}

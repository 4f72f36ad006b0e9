//! Signature-based injection discovery.
//!
//! Older tools were registered with only a call signature: parameters whose
//! annotation marks them as state- or store-injected. Current tools declare
//! their injections explicitly on [`Tool`](crate::tool::Tool); this module is
//! consulted only when that declaration is empty.

use conductor_core::tools::InjectedParam;

/// Metadata attached to a parameter annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationMarker {
    InjectedState,
    InjectedStore,
    Description(String),
}

/// Annotation of one signature parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamAnnotation {
    /// No annotation at all.
    Empty,
    /// A plain type name (`str`, `int`, `dict`, ...).
    Type(String),
    /// A bare marker used as the annotation itself.
    Marker(AnnotationMarker),
    /// A composite annotation: base type plus metadata markers.
    Annotated {
        base: Box<ParamAnnotation>,
        metadata: Vec<AnnotationMarker>,
    },
}

impl ParamAnnotation {
    pub fn annotated(base: ParamAnnotation, metadata: Vec<AnnotationMarker>) -> Self {
        ParamAnnotation::Annotated {
            base: Box::new(base),
            metadata,
        }
    }

    fn has_marker(&self, marker: &AnnotationMarker) -> bool {
        match self {
            ParamAnnotation::Empty | ParamAnnotation::Type(_) => false,
            ParamAnnotation::Marker(m) => m == marker,
            ParamAnnotation::Annotated { base, metadata } => {
                metadata.contains(marker) || base.has_marker(marker)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureParam {
    pub name: String,
    pub annotation: ParamAnnotation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolSignature {
    pub params: Vec<SignatureParam>,
}

impl ToolSignature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: impl Into<String>, annotation: ParamAnnotation) -> Self {
        self.params.push(SignatureParam {
            name: name.into(),
            annotation,
        });
        self
    }
}

/// Injections found by walking a signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredInjection {
    pub state: Vec<InjectedParam>,
    pub store: Option<String>,
}

/// Every parameter annotated as state-injected, directly or inside a
/// composite annotation, receives the whole state. The first store-injected
/// parameter becomes the store parameter.
pub fn discover_injected(signature: &ToolSignature) -> DiscoveredInjection {
    let mut found = DiscoveredInjection::default();
    for param in &signature.params {
        if param.annotation.has_marker(&AnnotationMarker::InjectedState) {
            tracing::debug!(param = %param.name, "state injection discovered from signature");
            found.state.push(InjectedParam::whole_state(&param.name));
        } else if found.store.is_none()
            && param.annotation.has_marker(&AnnotationMarker::InjectedStore)
        {
            found.store = Some(param.name.clone());
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_direct_and_annotated_state_markers() {
        let signature = ToolSignature::new()
            .param("query", ParamAnnotation::Type("str".into()))
            .param("state", ParamAnnotation::Marker(AnnotationMarker::InjectedState))
            .param(
                "snapshot",
                ParamAnnotation::annotated(
                    ParamAnnotation::Type("dict".into()),
                    vec![
                        AnnotationMarker::Description("graph state".into()),
                        AnnotationMarker::InjectedState,
                    ],
                ),
            )
            .param("config", ParamAnnotation::Empty);

        let found = discover_injected(&signature);
        assert_eq!(
            found.state,
            vec![
                InjectedParam::whole_state("state"),
                InjectedParam::whole_state("snapshot"),
            ]
        );
        assert_eq!(found.store, None);
    }

    #[test]
    fn nested_composite_annotations_are_walked() {
        let signature = ToolSignature::new().param(
            "state",
            ParamAnnotation::annotated(
                ParamAnnotation::annotated(
                    ParamAnnotation::Type("dict".into()),
                    vec![AnnotationMarker::InjectedState],
                ),
                vec![AnnotationMarker::Description("outer".into())],
            ),
        );
        assert_eq!(discover_injected(&signature).state.len(), 1);
    }

    #[test]
    fn store_marker_is_reported_separately() {
        let signature = ToolSignature::new()
            .param("store", ParamAnnotation::Marker(AnnotationMarker::InjectedStore));
        let found = discover_injected(&signature);
        assert!(found.state.is_empty());
        assert_eq!(found.store.as_deref(), Some("store"));
    }
}

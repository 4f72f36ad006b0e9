//! Registry of invocable tools.
//!
//! Built once at server startup, read concurrently by every request, and
//! cleared at shutdown. Names are normalized on the way in and on lookup, so
//! a model may refer to `search-web` or `search_web` interchangeably.
//!
//! Registering a name that is already taken (as a tool or a helper) fails
//! with [`RegistryError::DuplicateTool`]; entries are never overwritten.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use conductor_core::tools::{ToolDescriptor, normalize_tool_name};

use crate::tool::Tool;

const SUGGESTION_THRESHOLD: f64 = 0.85;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("tool '{name}' is already registered")]
    DuplicateTool { name: String },
    #[error("tool name '{raw}' is empty after normalization")]
    InvalidName { raw: String },
}

/// Result of a lookup: advertised tool or direct-call helper.
#[derive(Debug, Clone)]
pub enum Resolved {
    Tool(Arc<Tool>),
    Helper(Arc<Tool>),
}

#[derive(Default)]
struct RegistryInner {
    tools: BTreeMap<String, Arc<Tool>>,
    helpers: BTreeMap<String, Arc<Tool>>,
}

#[derive(Default)]
pub struct ToolRegistry {
    inner: RwLock<RegistryInner>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an advertised tool under its normalized name.
    pub fn register(&self, tool: Tool) -> Result<Arc<Tool>, RegistryError> {
        self.insert(tool, false)
    }

    /// Register a helper: callable by name, never advertised, invoked with
    /// the raw arguments only.
    pub fn register_helper(&self, tool: Tool) -> Result<Arc<Tool>, RegistryError> {
        self.insert(tool, true)
    }

    fn insert(&self, mut tool: Tool, helper: bool) -> Result<Arc<Tool>, RegistryError> {
        let name = normalize_tool_name(tool.name());
        if name.is_empty() {
            return Err(RegistryError::InvalidName {
                raw: tool.name().to_string(),
            });
        }
        if name != tool.name() {
            tracing::debug!(raw = %tool.name(), normalized = %name, "tool name normalized");
        }
        tool.descriptor.name = name.clone();

        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if inner.tools.contains_key(&name) || inner.helpers.contains_key(&name) {
            return Err(RegistryError::DuplicateTool { name });
        }
        let tool = Arc::new(tool);
        if helper {
            inner.helpers.insert(name, tool.clone());
        } else {
            inner.tools.insert(name, tool.clone());
        }
        Ok(tool)
    }

    pub fn resolve(&self, name: &str) -> Option<Resolved> {
        let name = normalize_tool_name(name);
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        if let Some(tool) = inner.tools.get(&name) {
            return Some(Resolved::Tool(tool.clone()));
        }
        inner
            .helpers
            .get(&name)
            .map(|helper| Resolved::Helper(helper.clone()))
    }

    /// Advertised tools only; helpers are not part of the model's tool list.
    pub fn all(&self) -> Vec<ToolDescriptor> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .tools
            .values()
            .map(|tool| tool.descriptor.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.tools.len() + inner.helpers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.tools.clear();
        inner.helpers.clear();
    }

    /// Closest registered name, if any is similar enough to be a likely typo.
    pub fn closest(&self, name: &str) -> Option<String> {
        let wanted = normalize_tool_name(name);
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .tools
            .keys()
            .chain(inner.helpers.keys())
            .map(|candidate| (candidate, strsim::jaro_winkler(&wanted, candidate)))
            .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(candidate, _)| candidate.clone())
    }
}

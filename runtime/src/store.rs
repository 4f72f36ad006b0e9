use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;

/// Conversation-scoped key-value side store, distinct from session state.
///
/// Handed to tools that declare a store parameter.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, namespace: &str, key: &str) -> Option<Value>;
    fn put(&self, namespace: &str, key: &str, value: Value);
    fn delete(&self, namespace: &str, key: &str) -> bool;
}

#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    entries: RwLock<HashMap<(String, String), Value>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&(namespace.to_string(), key.to_string()))
            .cloned()
    }

    fn put(&self, namespace: &str, key: &str, value: Value) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert((namespace.to_string(), key.to_string()), value);
    }

    fn delete(&self, namespace: &str, key: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries
            .remove(&(namespace.to_string(), key.to_string()))
            .is_some()
    }
}

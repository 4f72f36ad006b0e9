//! Tool registry, session-state injection and invocation dispatch.
//!
//! A call flows `StateResolver -> inject -> Dispatcher` and always ends in an
//! [`Envelope`](conductor_core::envelope::Envelope).

pub mod builtin;
pub mod client;
pub mod dispatch;
pub mod inject;
pub mod legacy;
pub mod mcp;
pub mod registry;
pub mod schema;
pub mod state;
pub mod store;
pub mod tool;
pub mod util;

pub use client::{ClientError, ToolClient};
pub use dispatch::Dispatcher;
pub use registry::{RegistryError, Resolved, ToolRegistry};
pub use state::{HttpStateStore, InMemoryStateStore, SessionState, StateResolver, StateStore};
pub use store::{InMemoryKeyValueStore, KeyValueStore};
pub use tool::{Tool, ToolError, ToolHandler, ToolInput};

//! Contract between the chat core and the realtime record store.
//!
//! The store is a JSON tree addressed by `/`-separated paths. Readers either
//! read a path once or subscribe to it; writers set one or several paths
//! atomically and may ask the store to stamp a value with its own clock.

mod error;
mod path;
mod query;
mod subscription;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

pub use error::StoreError;
pub use path::RecordPath;
pub use query::{compare_children, OrderBy, Query};
pub use subscription::Subscription;

/// Key of the placeholder object the store replaces with its commit time.
pub const SERVER_VALUE_KEY: &str = ".sv";

/// Placeholder the store substitutes with its own timestamp at commit.
pub fn server_timestamp() -> Value {
    json!({ SERVER_VALUE_KEY: "timestamp" })
}

/// Whether `value` is the server timestamp placeholder.
pub fn is_server_timestamp(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            map.len() == 1
                && map.get(SERVER_VALUE_KEY).and_then(Value::as_str) == Some("timestamp")
        }
        _ => false,
    }
}

/// Change to one child of a subscribed location.
#[derive(Debug, Clone, PartialEq)]
pub enum ChildEvent {
    Added { key: String, value: Value },
    Changed { key: String, value: Value },
    Removed { key: String },
}

impl ChildEvent {
    pub fn key(&self) -> &str {
        match self {
            ChildEvent::Added { key, .. }
            | ChildEvent::Changed { key, .. }
            | ChildEvent::Removed { key } => key,
        }
    }
}

/// Client side of the record store.
///
/// Writes are atomic: either every path of an [`update`](RecordStore::update)
/// becomes visible to subscribers or none does. Subscriptions deliver their
/// events one at a time and in commit order.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read the value at `path` once.
    async fn read(&self, path: &RecordPath) -> Result<Option<Value>, StoreError>;

    /// Set several paths in one commit. `None` deletes the path.
    async fn update(&self, changes: Vec<(RecordPath, Option<Value>)>) -> Result<(), StoreError>;

    /// Set `path` to `value` only if nothing is stored there yet. Returns
    /// `true` when this call created the value.
    async fn create_if_absent(&self, path: &RecordPath, value: Value) -> Result<bool, StoreError>;

    /// Apply `changes` in one commit only if the value at `guard` still
    /// equals `expected`. Returns `false`, writing nothing, when it does not.
    async fn update_if(
        &self,
        guard: &RecordPath,
        expected: Option<Value>,
        changes: Vec<(RecordPath, Option<Value>)>,
    ) -> Result<bool, StoreError>;

    /// Fresh insertion key, ordered after every key handed out before it.
    fn push_key(&self) -> String;

    /// Current children of `query.path` as `Added`, followed by every change.
    fn subscribe_children(&self, query: Query) -> Subscription<ChildEvent>;

    /// Current value of `path`, followed by every change to it.
    fn subscribe_value(&self, path: &RecordPath) -> Subscription<Option<Value>>;

    /// Set a single path.
    async fn write(&self, path: &RecordPath, value: Option<Value>) -> Result<(), StoreError> {
        self.update(vec![(path.clone(), value)]).await
    }
}

pub type SharedStore = Arc<dyn RecordStore>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_timestamp_is_recognised() {
        assert!(is_server_timestamp(&server_timestamp()));
        assert!(!is_server_timestamp(&json!({".sv": "other"})));
        assert!(!is_server_timestamp(&json!({".sv": "timestamp", "x": 1})));
        assert!(!is_server_timestamp(&json!(12)));
    }

    #[test]
    fn child_event_key() {
        let ev = ChildEvent::Removed { key: "k1".into() };
        assert_eq!(ev.key(), "k1");
    }
}

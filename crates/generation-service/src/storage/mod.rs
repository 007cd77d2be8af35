//! Document store abstraction
//!
//! The orchestration logic is storage-agnostic: it talks to a small document
//! interface implemented by an in-memory adapter and a Redis adapter, chosen
//! by configuration. Filters are equality maps over top-level fields; range
//! conditions (e.g. the daily usage window) are evaluated by the caller.

use aigen_common::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

pub mod memory;
pub mod redis;

pub use memory::MemoryStore;
pub use redis::RedisStore;

/// Equality filter over top-level document fields
pub type Filter = Map<String, Value>;

/// Build a single-field equality filter
pub fn filter_eq(field: &str, value: impl Into<Value>) -> Filter {
    let mut filter = Filter::new();
    filter.insert(field.to_string(), value.into());
    filter
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document, returning its id. A missing `id` field is filled
    /// with a fresh UUID.
    async fn insert_one(&self, collection: &str, doc: Value) -> Result<String>;

    /// All documents matching the filter
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Value>>;

    /// First document matching the filter
    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Value>>;

    /// Merge `set` into the first matching document. Returns whether a
    /// document was updated.
    async fn update_one(&self, collection: &str, filter: &Filter, set: Value) -> Result<bool>;

    /// Delete the first matching document. Returns whether one was deleted.
    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<bool>;
}

pub(crate) fn matches(doc: &Value, filter: &Filter) -> bool {
    filter.iter().all(|(key, expected)| doc.get(key) == Some(expected))
}

pub(crate) fn merge_set(doc: &mut Value, set: &Value) {
    if let (Some(target), Some(fields)) = (doc.as_object_mut(), set.as_object()) {
        for (key, value) in fields {
            target.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_matches_requires_every_field() {
        let doc = json!({"user_id": "u1", "status": "completed"});

        assert!(matches(&doc, &filter_eq("user_id", "u1")));
        assert!(!matches(&doc, &filter_eq("user_id", "u2")));

        let mut filter = filter_eq("user_id", "u1");
        filter.insert("status".to_string(), json!("failed"));
        assert!(!matches(&doc, &filter));
    }

    #[test]
    fn test_merge_set_overwrites_and_adds() {
        let mut doc = json!({"credits": 100, "nickname": "guest"});
        merge_set(&mut doc, &json!({"credits": 99, "generate_count": 1}));

        assert_eq!(doc["credits"], 99);
        assert_eq!(doc["nickname"], "guest");
        assert_eq!(doc["generate_count"], 1);
    }
}

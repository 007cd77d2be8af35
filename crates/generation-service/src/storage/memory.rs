//! In-memory document store
//!
//! Default backend for development and tests; data lives for the lifetime of
//! the process.

use aigen_common::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{matches, merge_set, DocumentStore, Filter};

#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_one(&self, collection: &str, doc: Value) -> Result<String> {
        let mut doc = doc;
        let fields = doc
            .as_object_mut()
            .ok_or_else(|| Error::Storage("document must be a JSON object".to_string()))?;

        let id = match fields.get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => {
                let id = Uuid::new_v4().to_string();
                fields.insert("id".to_string(), Value::String(id.clone()));
                id
            }
        };

        let mut collections = self.collections.lock().await;
        collections.entry(collection.to_string()).or_default().push(doc);

        Ok(id)
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Value>> {
        let collections = self.collections.lock().await;
        let docs = collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| matches(doc, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(docs)
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Value>> {
        let collections = self.collections.lock().await;
        let doc = collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| matches(doc, filter)).cloned());

        Ok(doc)
    }

    async fn update_one(&self, collection: &str, filter: &Filter, set: Value) -> Result<bool> {
        let mut collections = self.collections.lock().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };

        match docs.iter_mut().find(|doc| matches(doc, filter)) {
            Some(doc) => {
                merge_set(doc, &set);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<bool> {
        let mut collections = self.collections.lock().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };

        match docs.iter().position(|doc| matches(doc, filter)) {
            Some(index) => {
                docs.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

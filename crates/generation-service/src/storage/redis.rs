//! Redis document store
//!
//! Each collection is a Redis hash keyed by document id, holding JSON
//! documents. Filtering happens in-process; collections here are small and
//! per-user.

use aigen_common::{Error, Result};
use anyhow::Context;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use super::{matches, merge_set, DocumentStore, Filter};

pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis
    pub async fn new(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        info!("Connected to Redis at {}", redis_url);

        Ok(Self { conn })
    }

    fn collection_key(collection: &str) -> String {
        format!("col:{collection}")
    }

    async fn load(&self, collection: &str) -> Result<Vec<Value>> {
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn
            .hvals(Self::collection_key(collection))
            .await
            .map_err(storage_err)?;

        raw.iter()
            .map(|json| serde_json::from_str(json).map_err(Error::Json))
            .collect()
    }

    async fn write(&self, collection: &str, id: &str, doc: &Value) -> Result<()> {
        let json = serde_json::to_string(doc)?;
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(Self::collection_key(collection), id, json)
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for RedisStore {
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

        self.write(collection, &id, &doc).await?;
        Ok(id)
    }

    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Value>> {
        let docs = self.load(collection).await?;
        Ok(docs.into_iter().filter(|doc| matches(doc, filter)).collect())
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Value>> {
        let docs = self.load(collection).await?;
        Ok(docs.into_iter().find(|doc| matches(doc, filter)))
    }

    async fn update_one(&self, collection: &str, filter: &Filter, set: Value) -> Result<bool> {
        let docs = self.load(collection).await?;
        let Some(mut doc) = docs.into_iter().find(|doc| matches(doc, filter)) else {
            return Ok(false);
        };

        merge_set(&mut doc, &set);

        let id = doc
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Storage("stored document has no id".to_string()))?
            .to_string();

        self.write(collection, &id, &doc).await?;
        Ok(true)
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<bool> {
        let docs = self.load(collection).await?;
        let Some(doc) = docs.into_iter().find(|doc| matches(doc, filter)) else {
            return Ok(false);
        };

        let id = doc
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Storage("stored document has no id".to_string()))?
            .to_string();

        let mut conn = self.conn.clone();
        let deleted: u64 = conn
            .hdel(Self::collection_key(collection), &id)
            .await
            .map_err(storage_err)?;

        Ok(deleted > 0)
    }
}

fn storage_err(err: redis::RedisError) -> Error {
    Error::Storage(err.to_string())
}

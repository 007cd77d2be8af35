//! User lookup and creation on top of the document store

use aigen_common::Result;
use tracing::info;

use crate::models::User;
use crate::storage::{filter_eq, DocumentStore};

pub const USERS_COLLECTION: &str = "users";

pub async fn find_by_id(store: &dyn DocumentStore, id: &str) -> Result<Option<User>> {
    let doc = store.find_one(USERS_COLLECTION, &filter_eq("id", id)).await?;
    doc.map(|doc| serde_json::from_value(doc).map_err(Into::into))
        .transpose()
}

pub async fn find_by_open_id(store: &dyn DocumentStore, open_id: &str) -> Result<Option<User>> {
    let doc = store
        .find_one(USERS_COLLECTION, &filter_eq("open_id", open_id))
        .await?;
    doc.map(|doc| serde_json::from_value(doc).map_err(Into::into))
        .transpose()
}

/// Guest login: look the device up, creating the user on first contact
pub async fn find_or_create(
    store: &dyn DocumentStore,
    open_id: &str,
    nickname: &str,
) -> Result<User> {
    if let Some(user) = find_by_open_id(store, open_id).await? {
        return Ok(user);
    }

    let user = User::new_guest(open_id.to_string(), nickname.to_string());
    store
        .insert_one(USERS_COLLECTION, serde_json::to_value(&user)?)
        .await?;

    info!("Created user {} for device {}", user.id, open_id);
    Ok(user)
}

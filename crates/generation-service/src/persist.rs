//! Bounded-retry persistence with a dead-letter fallback
//!
//! A generation attempt must never be silently dropped: the work write is
//! retried with a linearly increasing delay, then the full payload is copied
//! to the emergency backup collection. The backup is additive and only read
//! by recovery tooling, never by the hot path.

use aigen_common::{Error, Result};
use chrono::Utc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::{EmergencyBackup, Work};
use crate::storage::DocumentStore;

pub const WORKS_COLLECTION: &str = "works";
pub const BACKUP_COLLECTION: &str = "emergency_backup";

const MAX_ATTEMPTS: u32 = 3;

/// Insert `work`, retrying up to three times with delays of one, then two
/// retry units. On exhaustion an emergency backup tagged with `backup_reason`
/// is written instead; only a failure of that backup write is an error.
pub async fn persist_work(
    store: &dyn DocumentStore,
    work: &Work,
    backup_reason: &str,
    retry_unit: Duration,
) -> Result<()> {
    let doc = serde_json::to_value(work)?;

    let mut last_error = None;
    for attempt in 1..=MAX_ATTEMPTS {
        match store.insert_one(WORKS_COLLECTION, doc.clone()).await {
            Ok(_) => {
                if attempt > 1 {
                    info!("Work {} persisted on attempt {}", work.id, attempt);
                }
                return Ok(());
            }
            Err(e) => {
                warn!(
                    "Persist attempt {}/{} for work {} failed: {}",
                    attempt, MAX_ATTEMPTS, work.id, e
                );
                last_error = Some(e);
                if attempt < MAX_ATTEMPTS {
                    tokio::time::sleep(retry_unit * attempt).await;
                }
            }
        }
    }

    let original_error = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "unknown error".to_string());

    let backup = EmergencyBackup {
        id: Uuid::new_v4().to_string(),
        work: work.clone(),
        backup_reason: backup_reason.to_string(),
        original_error,
        created_at: Utc::now(),
    };

    match store
        .insert_one(BACKUP_COLLECTION, serde_json::to_value(&backup)?)
        .await
    {
        Ok(_) => {
            error!(
                "Work {} written to emergency backup: {}",
                work.id, backup_reason
            );
            Ok(())
        }
        Err(e) => {
            error!("Emergency backup for work {} failed: {}", work.id, e);
            Err(Error::Business("data save failed".to_string()))
        }
    }
}

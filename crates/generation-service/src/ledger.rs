//! Daily usage ledger
//!
//! Counts a user's non-failed works inside the current server-local day and
//! enforces the tier quota before any provider call. The window is fixed at
//! local midnight, not rolling 24 hours. The read-then-write check is not
//! atomic; concurrent requests from one user can slightly overshoot the
//! quota.

use aigen_common::{Error, Result};
use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::config::QuotaConfig;
use crate::models::{Tier, User};
use crate::persist::WORKS_COLLECTION;
use crate::storage::{filter_eq, DocumentStore};

/// A user's position against the daily quota
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyUsage {
    pub used: u64,
    pub limit: u64,
    pub remaining: u64,
    /// Next local midnight, when the window resets
    pub reset_at: DateTime<Local>,
}

impl DailyUsage {
    pub fn new(used: u64, limit: u64, reset_at: DateTime<Local>) -> Self {
        Self {
            used,
            limit,
            remaining: limit.saturating_sub(used),
            reset_at,
        }
    }
}

pub struct UsageLedger {
    quotas: QuotaConfig,
}

impl UsageLedger {
    pub fn new(quotas: QuotaConfig) -> Self {
        Self { quotas }
    }

    pub fn quota_for(&self, tier: Tier) -> u64 {
        match tier {
            Tier::Free => self.quotas.free,
            Tier::Vip => self.quotas.vip,
            Tier::Admin => self.quotas.admin,
        }
    }

    /// Usage for the current local day
    pub async fn usage_today(&self, store: &dyn DocumentStore, user: &User) -> Result<DailyUsage> {
        let works = store
            .find(WORKS_COLLECTION, &filter_eq("user_id", user.id.as_str()))
            .await?;

        let (start, end) = local_day_bounds(Local::now());
        let used = works
            .iter()
            .filter(|doc| counts_toward_quota(doc, start, end))
            .count() as u64;

        Ok(DailyUsage::new(used, self.quota_for(user.tier()), end))
    }

    /// Reject the attempt before any provider call once the quota is
    /// exhausted; free-tier users additionally need a positive credit balance.
    pub async fn check(&self, store: &dyn DocumentStore, user: &User) -> Result<DailyUsage> {
        let usage = self.usage_today(store, user).await?;

        if usage.used >= usage.limit {
            return Err(Error::QuotaExceeded {
                used: usage.used,
                limit: usage.limit,
                reset_at: usage.reset_at,
            });
        }

        if user.tier() == Tier::Free && user.credits <= 0 {
            return Err(Error::InsufficientCredits);
        }

        Ok(usage)
    }
}

fn counts_toward_quota(doc: &Value, start: DateTime<Local>, end: DateTime<Local>) -> bool {
    if doc.get("status").and_then(Value::as_str) == Some("failed") {
        return false;
    }

    let Some(created_at) = doc
        .get("created_at")
        .and_then(Value::as_str)
        .and_then(|raw| raw.parse::<DateTime<Utc>>().ok())
    else {
        return false;
    };

    let created_at = created_at.with_timezone(&Local);
    created_at >= start && created_at < end
}

fn local_day_bounds(now: DateTime<Local>) -> (DateTime<Local>, DateTime<Local>) {
    let midnight = now.date_naive().and_time(NaiveTime::MIN);
    // Local midnight is unambiguous except on DST transitions that skip it.
    let start = Local
        .from_local_datetime(&midnight)
        .earliest()
        .unwrap_or(now);
    (start, start + Duration::hours(24))
}

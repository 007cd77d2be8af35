//! Data models for the generation service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User tier determining the daily quota and credit rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Free,
    Vip,
    Admin,
}

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,

    /// Device id or platform open-id the user logged in with
    pub open_id: String,

    pub nickname: String,

    /// "guest", "wechat" or "admin"
    pub user_type: String,

    pub vip_level: u32,

    pub credits: i64,

    /// Lifetime number of successful generations
    pub generate_count: u64,

    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a guest user on first login, with the starting credit grant
    pub fn new_guest(open_id: String, nickname: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            open_id,
            nickname,
            user_type: "guest".to_string(),
            vip_level: 0,
            credits: 100,
            generate_count: 0,
            created_at: Utc::now(),
        }
    }

    /// Tier is derived from stored flags, never persisted directly
    pub fn tier(&self) -> Tier {
        if self.user_type == "admin" {
            Tier::Admin
        } else if self.vip_level > 0 {
            Tier::Vip
        } else {
            Tier::Free
        }
    }
}

/// Outcome of a generation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkStatus {
    Pending,
    Completed,
    Failed,
}

/// One persisted generation attempt
///
/// Immutable once written; a failed attempt is a separate record, not an
/// update of an earlier one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Work {
    pub id: String,

    pub user_id: String,

    /// Display title derived from the original prompt
    pub title: String,

    /// Full prompt after character prefixing
    pub prompt: String,

    /// Raw text the user typed
    pub original_prompt: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhanced_prompt: Option<String>,

    pub style: String,

    /// Prompt-enhancement provider used, possibly "mock"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_service: Option<String>,

    /// Image-generation provider used, possibly "mock" after a silent fallback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_service: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    pub status: WorkStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Work {
    /// Record for a successful generation
    #[allow(clippy::too_many_arguments)]
    pub fn completed(
        user_id: &str,
        original_prompt: &str,
        prompt: &str,
        enhanced_prompt: &str,
        style: &str,
        prompt_service: &str,
        image_service: &str,
        image_url: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title_for(original_prompt),
            prompt: prompt.to_string(),
            original_prompt: original_prompt.to_string(),
            enhanced_prompt: Some(enhanced_prompt.to_string()),
            style: style.to_string(),
            prompt_service: Some(prompt_service.to_string()),
            image_service: Some(image_service.to_string()),
            image_url: Some(image_url.to_string()),
            status: WorkStatus::Completed,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    /// Record for a generation that failed before producing an image
    pub fn failed(user_id: &str, original_prompt: &str, prompt: &str, style: &str, error: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title_for(original_prompt),
            prompt: prompt.to_string(),
            original_prompt: original_prompt.to_string(),
            enhanced_prompt: None,
            style: style.to_string(),
            prompt_service: None,
            image_service: None,
            image_url: None,
            status: WorkStatus::Failed,
            error_message: Some(error.to_string()),
            created_at: Utc::now(),
        }
    }
}

/// Dead-letter copy of a work that failed normal persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyBackup {
    pub id: String,

    /// Full payload of the work that could not be written
    pub work: Work,

    /// Why the backup was taken, e.g. which write path exhausted its retries
    pub backup_reason: String,

    /// Error text of the last failed write attempt
    pub original_error: String,

    pub created_at: DateTime<Utc>,
}

fn title_for(prompt: &str) -> String {
    if prompt.chars().count() > 50 {
        let head: String = prompt.chars().take(50).collect();
        format!("{head}...")
    } else {
        prompt.to_string()
    }
}

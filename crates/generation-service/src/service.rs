//! Two-step generation orchestration
//!
//! prompt enhancement -> image generation (with mock fallback) -> work record
//! persisted with retry/backup -> usage bookkeeping. Provider clients and the
//! document store are constructor-injected so the flow can be driven against
//! test doubles.

use aigen_common::{Error, Result};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::ledger::{DailyUsage, UsageLedger};
use crate::models::{Tier, User, Work, WorkStatus};
use crate::persist::{persist_work, WORKS_COLLECTION};
use crate::providers::{select_provider, ImageClient, PromptClient};
use crate::storage::{filter_eq, DocumentStore};
use crate::users::USERS_COLLECTION;

const MAX_PROMPT_CHARS: usize = 500;

pub struct GenerationService {
    config: Config,
    store: Arc<dyn DocumentStore>,
    prompt_client: PromptClient,
    image_client: ImageClient,
    ledger: UsageLedger,
}

/// Input of one generation attempt
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub character: Option<String>,
    pub style: String,
}

/// Result of a successful generation
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOutcome {
    pub work_id: String,
    pub image_url: String,
    pub prompt: String,
    pub enhanced_prompt: String,
    pub daily_usage: DailyUsage,
}

/// One row of the work history listing
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkSummary {
    pub work_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub prompt: String,
    pub style: String,
    pub status: WorkStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub list: Vec<WorkSummary>,
    pub pagination: Pagination,
}

/// Configured provider as reported by the status endpoint
#[derive(Debug, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    #[serde(rename = "type")]
    pub role: String,
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub services: Vec<ProviderStatus>,
    pub available: bool,
}

impl GenerationService {
    pub fn new(config: Config, store: Arc<dyn DocumentStore>) -> Self {
        let image_client = ImageClient::new(Duration::from_millis(config.mock_latency_ms));
        let ledger = UsageLedger::new(config.quotas);

        Self {
            config,
            store,
            prompt_client: PromptClient::new(),
            image_client,
            ledger,
        }
    }

    /// Run the full generation flow for one request
    pub async fn generate(&self, user: &User, request: GenerateRequest) -> Result<GenerateOutcome> {
        let prompt = request.prompt.trim();
        if prompt.is_empty() {
            return Err(Error::Validation("prompt must not be empty".to_string()));
        }
        if prompt.chars().count() > MAX_PROMPT_CHARS {
            return Err(Error::Validation(format!(
                "prompt must not exceed {MAX_PROMPT_CHARS} characters"
            )));
        }

        // Character prefixing happens before enhancement, as on the route.
        let full_prompt = match request.character.as_deref().map(str::trim) {
            Some(character) if !character.is_empty() => format!("{character}, {prompt}"),
            _ => prompt.to_string(),
        };

        let usage = self.ledger.check(self.store.as_ref(), user).await?;

        let retry_unit = Duration::from_millis(self.config.retry_unit_ms);

        let prompt_selection = select_provider(&self.config.prompt_providers);
        info!("Step 1: enhancing prompt via {}", prompt_selection.name());

        let enhanced_prompt = match self
            .prompt_client
            .enhance(&prompt_selection, &full_prompt, &request.style)
            .await
        {
            Ok(enhanced) => enhanced,
            Err(e) => {
                error!("Prompt enhancement failed: {e}");
                let failed =
                    Work::failed(&user.id, prompt, &full_prompt, &request.style, &e.to_string());
                if let Err(persist_err) =
                    persist_work(self.store.as_ref(), &failed, "failed work record", retry_unit)
                        .await
                {
                    error!("Could not record failed attempt: {persist_err}");
                }
                // Detail stays in the logs and the failed record.
                return Err(Error::AiService("please try again later".to_string()));
            }
        };

        let image_selection = select_provider(&self.config.image_providers);
        info!("Step 2: generating image via {}", image_selection.name());

        let image = self
            .image_client
            .generate(&image_selection, &enhanced_prompt)
            .await;

        let work = Work::completed(
            &user.id,
            prompt,
            &full_prompt,
            &enhanced_prompt,
            &request.style,
            prompt_selection.name(),
            &image.provider,
            &image.url,
        );

        persist_work(self.store.as_ref(), &work, "completed work record", retry_unit).await?;

        self.record_usage(user).await;

        info!("Generation complete, work {}", work.id);

        Ok(GenerateOutcome {
            work_id: work.id,
            image_url: image.url,
            prompt: full_prompt,
            enhanced_prompt,
            daily_usage: DailyUsage::new(usage.used + 1, usage.limit, usage.reset_at),
        })
    }

    /// Best-effort bookkeeping after a successful generation
    async fn record_usage(&self, user: &User) {
        // The request-scoped snapshot may be stale by now; re-read so
        // concurrent generations do not clobber each other's counters.
        let fresh = match crate::users::find_by_id(self.store.as_ref(), &user.id).await {
            Ok(Some(fresh)) => fresh,
            Ok(None) => {
                warn!("User {} disappeared before usage update", user.id);
                return;
            }
            Err(e) => {
                warn!("Failed to reload user {} for usage update: {}", user.id, e);
                return;
            }
        };

        let mut set = serde_json::Map::new();
        set.insert("generate_count".to_string(), json!(fresh.generate_count + 1));
        if fresh.tier() == Tier::Free {
            set.insert("credits".to_string(), json!(fresh.credits - 1));
        }

        if let Err(e) = self
            .store
            .update_one(
                USERS_COLLECTION,
                &filter_eq("id", user.id.as_str()),
                serde_json::Value::Object(set),
            )
            .await
        {
            warn!("Failed to update usage counters for user {}: {}", user.id, e);
        }
    }

    /// A user's works, newest first
    pub async fn history(&self, user: &User, page: u64, page_size: u64) -> Result<HistoryPage> {
        let docs = self
            .store
            .find(WORKS_COLLECTION, &filter_eq("user_id", user.id.as_str()))
            .await?;

        let mut works: Vec<Work> = docs
            .into_iter()
            .filter_map(|doc| serde_json::from_value(doc).ok())
            .collect();
        works.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = works.len() as u64;
        let page = page.max(1);
        // Page numbers come from the query string; saturate instead of
        // overflowing on absurd values.
        let start = page.saturating_sub(1).saturating_mul(page_size);

        let list = works
            .into_iter()
            .skip(usize::try_from(start).unwrap_or(usize::MAX))
            .take(page_size as usize)
            .map(|work| WorkSummary {
                work_id: work.id,
                title: work.title,
                image_url: work.image_url,
                prompt: work.original_prompt,
                style: work.style,
                status: work.status,
                created_at: work.created_at,
            })
            .collect();

        Ok(HistoryPage {
            list,
            pagination: Pagination {
                page,
                page_size,
                total,
                total_pages: total.div_ceil(page_size.max(1)),
            },
        })
    }

    /// One work, scoped to its owner
    pub async fn work_detail(&self, user: &User, work_id: &str) -> Result<Work> {
        let mut filter = filter_eq("id", work_id);
        filter.insert("user_id".to_string(), json!(user.id));

        let doc = self
            .store
            .find_one(WORKS_COLLECTION, &filter)
            .await?
            .ok_or_else(|| Error::NotFound("work".to_string()))?;

        serde_json::from_value(doc).map_err(Into::into)
    }

    /// Configured providers and overall availability
    pub fn status(&self) -> ServiceStatus {
        let services: Vec<ProviderStatus> = self
            .config
            .prompt_providers
            .iter()
            .map(|p| (p, "prompt_generator"))
            .chain(self.config.image_providers.iter().map(|p| (p, "image_generator")))
            .map(|(provider, role)| ProviderStatus {
                name: provider.name.clone(),
                role: role.to_string(),
                enabled: provider.enabled(),
            })
            .collect();

        let available = services.iter().any(|service| service.enabled);

        ServiceStatus { services, available }
    }

    /// Today's usage against the user's quota
    pub async fn daily_usage(&self, user: &User) -> Result<DailyUsage> {
        self.ledger.usage_today(self.store.as_ref(), user).await
    }
}

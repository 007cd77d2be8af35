//! AI provider selection and clients
//!
//! Each role (prompt enhancement, image generation) has a static candidate
//! list from configuration and exactly one provider is selected per request.
//! An empty enabled set selects the synthetic mock provider.

pub mod image;
pub mod prompt;

pub use image::{GeneratedImage, ImageClient};
pub use prompt::PromptClient;

use crate::config::ProviderConfig;

/// Name reported when no real provider handled a role
pub const MOCK_PROVIDER: &str = "mock";

/// Outcome of provider selection for one role
#[derive(Debug, Clone)]
pub enum Selection {
    Mock,
    Provider(ProviderConfig),
}

impl Selection {
    pub fn name(&self) -> &str {
        match self {
            Selection::Mock => MOCK_PROVIDER,
            Selection::Provider(provider) => &provider.name,
        }
    }
}

/// Select one provider from the candidate list
///
/// Enabled candidates are ordered by explicit priority (lower wins); a stable
/// sort keeps declaration order among equal or missing priorities.
pub fn select_provider(candidates: &[ProviderConfig]) -> Selection {
    let mut enabled: Vec<&ProviderConfig> =
        candidates.iter().filter(|p| p.enabled()).collect();

    if enabled.is_empty() {
        return Selection::Mock;
    }

    enabled.sort_by_key(|p| p.priority.unwrap_or(u32::MAX));
    Selection::Provider(enabled[0].clone())
}

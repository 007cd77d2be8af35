use chrono::{DateTime, Local};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Daily limit reached ({used}/{limit}), resets at {reset_at}")]
    QuotaExceeded {
        used: u64,
        limit: u64,
        reset_at: DateTime<Local>,
    },

    #[error("Insufficient credits, please top up or upgrade to VIP")]
    InsufficientCredits,

    #[error("{0}")]
    Business(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("AI service error: {0}")]
    AiService(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Envelope code carried in the response body, mirroring the HTTP status.
    pub fn code(&self) -> u16 {
        match self {
            Error::Validation(_)
            | Error::QuotaExceeded { .. }
            | Error::InsufficientCredits
            | Error::Business(_) => 400,
            Error::Auth(_) => 401,
            Error::NotFound(_) => 404,
            Error::AiService(_) | Error::Storage(_) | Error::Json(_) | Error::Other(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

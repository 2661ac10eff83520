//! Error types for the lazy tree data layer.

use crate::types::NodeKey;
use thiserror::Error;

/// Durable store failures. Callers on the paging path treat these as a tier miss.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Store I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Failed to encode record: {0}")]
    Encode(String),

    #[error("Failed to decode record: {0}")]
    Decode(String),

    #[error("Store task failed: {0}")]
    Task(String),

    #[error("Invalid page request: page={page}, page_size={page_size}")]
    InvalidPage { page: u32, page_size: u32 },
}

/// Remote fetch failures
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Remote request failed: {0}")]
    Request(String),

    #[error("Remote returned status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Failed to decode remote page: {0}")]
    Decode(String),

    #[error("Remote fetch timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },
}

impl FetchError {
    /// Whether a later attempt at the same page may succeed. Transport
    /// failures and every non-2xx status are transient; a malformed body is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Request(_) | FetchError::Status { .. } | FetchError::Timeout { .. } => {
                true
            }
            FetchError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Request(err.to_string())
        }
    }
}

/// Top-level error surfaced to consumers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Fetch error: {0}")]
    FetchError(#[from] FetchError),

    #[error("Page {page} of {} unavailable from every tier: {source}", display_parent(.parent))]
    PageUnavailable {
        parent: Option<NodeKey>,
        page: u32,
        source: FetchError,
    },

    #[error("Invalid page request: page={page}, page_size={page_size}")]
    InvalidPage { page: u32, page_size: u32 },

    #[error("Tree store worker is not running")]
    TreeUnavailable,
}

impl ApiError {
    /// Whether retrying the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::PageUnavailable { source, .. } | ApiError::FetchError(source) => {
                source.is_retryable()
            }
            _ => false,
        }
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

fn display_parent(parent: &Option<NodeKey>) -> String {
    match parent {
        Some(key) => format!("parent {}", key),
        None => "roots".to_string(),
    }
}

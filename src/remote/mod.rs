//! Remote page source
//!
//! The last tier consulted by the paging coordinator. Implementations must
//! honor the paging contract: `total` is the root total for root queries and
//! the child total otherwise, node keys are `{parent}-{globalIndex}` (bare
//! `{globalIndex}` for roots), and `hasMore = page * pageSize < total`.

pub mod http;
pub mod synthetic;

use crate::error::FetchError;
use crate::types::{PageRequest, PageResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use http::HttpRemoteSource;
pub use synthetic::SyntheticSource;

/// Source of pages that are in neither cache tier
#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse, FetchError>;
}

/// Remote source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the node service; none selects the in-process synthetic source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Artificial latency of the synthetic source in milliseconds
    #[serde(default = "default_synthetic_latency_ms")]
    pub synthetic_latency_ms: u64,
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_synthetic_latency_ms() -> u64 {
    100
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: default_timeout_ms(),
            synthetic_latency_ms: default_synthetic_latency_ms(),
        }
    }
}

//! In-process deterministic node source
//!
//! Generates the same pages as the reference node service: keys derived from the
//! global index, every node expandable, optional fixed latency.

use super::RemoteSource;
use crate::error::FetchError;
use crate::types::{Node, NodeKey, PageRequest, PageResponse, PagingPolicy};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub struct SyntheticSource {
    policy: PagingPolicy,
    latency: Duration,
    requests: AtomicUsize,
}

impl SyntheticSource {
    pub fn new(policy: PagingPolicy) -> Self {
        Self::with_latency(policy, Duration::ZERO)
    }

    pub fn with_latency(policy: PagingPolicy, latency: Duration) -> Self {
        Self {
            policy,
            latency,
            requests: AtomicUsize::new(0),
        }
    }

    /// Number of pages served
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Build the page for `request`; nodes stop at the parent's total
    pub fn generate(&self, request: &PageRequest) -> PageResponse {
        let total = self.policy.total_for(request.parent.as_ref());
        let start = request.first_ordinal();
        let end = start.saturating_add(u64::from(request.page_size)).min(total);

        let nodes = (start..end)
            .map(|index| {
                let key = match &request.parent {
                    Some(parent) => NodeKey::child(parent, index),
                    None => NodeKey::root(index),
                };
                Node {
                    id: key.to_string(),
                    title: format!("Node {}", key),
                    key,
                    is_leaf: false,
                    parent_key: None,
                }
            })
            .collect();

        PageResponse {
            nodes,
            total,
            has_more: u64::from(request.page) * u64::from(request.page_size) < total,
        }
    }
}

#[async_trait]
impl RemoteSource for SyntheticSource {
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse, FetchError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(self.generate(request))
    }
}

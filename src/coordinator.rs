//! Paging Coordinator
//!
//! Resolves `(parent, page)` through the tiers in order: memory cache, durable
//! store, remote source. Every resolution below the memory cache populates it;
//! every remote resolution is also persisted. A page is cached all-or-nothing.

use crate::cache::MemoryCache;
use crate::error::{ApiError, FetchError};
use crate::remote::RemoteSource;
use crate::store::{DurableStore, StoredPage};
use crate::types::{Node, NodeKey, PageRequest, PageResponse, PagingPolicy};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Tier that answered a page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Memory,
    Durable,
    Remote,
}

/// Coordinator counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub memory_hits: usize,
    pub durable_hits: usize,
    pub remote_fetches: usize,
    pub durable_errors: usize,
    pub remote_failures: usize,
}

pub struct PagingCoordinator {
    cache: Arc<MemoryCache<PageResponse>>,
    durable: Arc<dyn DurableStore>,
    remote: Arc<dyn RemoteSource>,
    policy: PagingPolicy,
    fetch_timeout: Duration,
    stats: RwLock<CoordinatorStats>,
    /// Bumped by `clear`; a load that straddles a clear does not write back
    epoch: AtomicU64,
    /// Write-backs hold it shared, `clear` exclusively
    write_gate: tokio::sync::RwLock<()>,
}

impl PagingCoordinator {
    pub fn new(
        cache: Arc<MemoryCache<PageResponse>>,
        durable: Arc<dyn DurableStore>,
        remote: Arc<dyn RemoteSource>,
        policy: PagingPolicy,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            durable,
            remote,
            policy,
            fetch_timeout,
            stats: RwLock::new(CoordinatorStats::default()),
            epoch: AtomicU64::new(0),
            write_gate: tokio::sync::RwLock::new(()),
        }
    }

    pub fn policy(&self) -> &PagingPolicy {
        &self.policy
    }

    pub fn cache(&self) -> &MemoryCache<PageResponse> {
        &self.cache
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.stats.read().clone()
    }

    /// Get one page of `parent`'s children (or of the roots)
    pub async fn load_page(
        &self,
        parent: Option<&NodeKey>,
        page: u32,
    ) -> Result<PageResponse, ApiError> {
        self.load_page_traced(parent, page).await.map(|(page, _)| page)
    }

    /// Like [`load_page`](Self::load_page), also reporting which tier answered
    pub async fn load_page_traced(
        &self,
        parent: Option<&NodeKey>,
        page: u32,
    ) -> Result<(PageResponse, Tier), ApiError> {
        if page == 0 || self.policy.page_size == 0 {
            return Err(ApiError::InvalidPage {
                page,
                page_size: self.policy.page_size,
            });
        }
        let request = self.policy.request(parent, page);
        let cache_key = MemoryCache::<PageResponse>::generate_key(parent, page);

        let epoch = self.epoch.load(Ordering::SeqCst);

        if let Some(hit) = self.cache.get(&cache_key) {
            self.stats.write().memory_hits += 1;
            debug!(key = %cache_key, "Memory cache hit");
            return Ok((hit, Tier::Memory));
        }

        if let Some(response) = self.from_durable(&request).await {
            self.stats.write().durable_hits += 1;
            debug!(key = %cache_key, "Durable store hit");
            let _gate = self.write_gate.read().await;
            if self.epoch.load(Ordering::SeqCst) == epoch {
                self.cache.set(cache_key, response.clone());
            }
            return Ok((response, Tier::Durable));
        }

        let response = self.from_remote(&request).await?;
        self.stats.write().remote_fetches += 1;

        let _gate = self.write_gate.read().await;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!(key = %cache_key, "Caches cleared during fetch, not storing page");
            return Ok((response, Tier::Remote));
        }
        if !response.nodes.is_empty() {
            if let Err(e) = self.durable.add_nodes(&response.nodes, parent).await {
                self.stats.write().durable_errors += 1;
                warn!(key = %cache_key, error = %e, "Failed to persist fetched page");
            }
        }
        self.cache.set(cache_key, response.clone());
        Ok((response, Tier::Remote))
    }

    /// Empty the memory cache and the durable store
    pub async fn clear(&self) -> Result<(), ApiError> {
        let _gate = self.write_gate.write().await;
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.cache.clear();
        self.durable.clear_all().await?;
        info!("Page caches cleared");
        Ok(())
    }

    /// Durable lookup; failures and incomplete pages count as a miss
    async fn from_durable(&self, request: &PageRequest) -> Option<PageResponse> {
        let stored = match self
            .durable
            .get_nodes(request.parent.as_ref(), request.page, request.page_size)
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                self.stats.write().durable_errors += 1;
                warn!(
                    parent = ?request.parent,
                    page = request.page,
                    error = %e,
                    "Durable store read failed, falling through to remote"
                );
                return None;
            }
        };

        let total = self.policy.total_for(request.parent.as_ref());
        if !is_complete_page(&stored, request, total) {
            if !stored.nodes.is_empty() {
                debug!(
                    parent = ?request.parent,
                    page = request.page,
                    found = stored.nodes.len(),
                    "Durable page incomplete, treating as miss"
                );
            }
            return None;
        }

        Some(PageResponse {
            nodes: stored.nodes,
            total,
            has_more: self.policy.has_more(request.page, total),
        })
    }

    async fn from_remote(&self, request: &PageRequest) -> Result<PageResponse, ApiError> {
        let started = Instant::now();
        let fetched = match tokio::time::timeout(self.fetch_timeout, self.remote.fetch_page(request))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                after_ms: self.fetch_timeout.as_millis() as u64,
            }),
        };

        let response = match fetched {
            Ok(response) => response,
            Err(source) => {
                self.stats.write().remote_failures += 1;
                warn!(
                    parent = ?request.parent,
                    page = request.page,
                    error = %source,
                    retryable = source.is_retryable(),
                    "Remote fetch failed"
                );
                return Err(ApiError::PageUnavailable {
                    parent: request.parent.clone(),
                    page: request.page,
                    source,
                });
            }
        };

        debug!(
            parent = ?request.parent,
            page = request.page,
            count = response.nodes.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Remote page fetched"
        );

        let nodes: Vec<Node> = response
            .nodes
            .iter()
            .map(|node| node.with_parent(request.parent.as_ref()))
            .collect();
        Ok(PageResponse {
            nodes,
            total: response.total,
            has_more: self.policy.has_more(request.page, response.total),
        })
    }
}

/// A stored window is usable only if it is exactly the requested slice
fn is_complete_page(stored: &StoredPage, request: &PageRequest, total: u64) -> bool {
    let (Some(first), Some(last)) = (stored.nodes.first(), stored.nodes.last()) else {
        return false;
    };
    let expected_first = request.first_ordinal();
    let len = stored.nodes.len() as u64;
    let positioned = first.key.ordinal() == Some(expected_first)
        && last.key.ordinal() == Some(expected_first + len - 1);
    let full = len == u64::from(request.page_size) || expected_first + len >= total;
    positioned && full
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::error::StorageError;
    use crate::remote::SyntheticSource;
    use crate::store::SledNodeStore;
    use async_trait::async_trait;

    struct FailingStore;

    #[async_trait]
    impl DurableStore for FailingStore {
        async fn add_nodes(&self, _: &[Node], _: Option<&NodeKey>) -> Result<(), StorageError> {
            Err(StorageError::Task("write refused".to_string()))
        }

        async fn get_nodes(
            &self,
            _: Option<&NodeKey>,
            _: u32,
            _: u32,
        ) -> Result<StoredPage, StorageError> {
            Err(StorageError::Task("read refused".to_string()))
        }

        async fn clear_all(&self) -> Result<(), StorageError> {
            Ok(())
        }
    }

    fn policy() -> PagingPolicy {
        PagingPolicy {
            page_size: 10,
            ..PagingPolicy::default()
        }
    }

    fn coordinator(
        durable: Arc<dyn DurableStore>,
        remote: Arc<SyntheticSource>,
    ) -> PagingCoordinator {
        PagingCoordinator::new(
            Arc::new(MemoryCache::new(&CacheConfig::default())),
            durable,
            remote,
            policy(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_tiers_consulted_in_order() {
        let durable = Arc::new(SledNodeStore::temporary());
        let remote = Arc::new(SyntheticSource::new(policy()));
        let coordinator = coordinator(durable.clone(), remote.clone());

        let (first, tier) = coordinator.load_page_traced(None, 1).await.unwrap();
        assert_eq!(tier, Tier::Remote);
        assert_eq!(first.nodes.len(), 10);
        assert!(first.has_more);
        assert_eq!(durable.record_count().await.unwrap(), 10);

        let (_, tier) = coordinator.load_page_traced(None, 1).await.unwrap();
        assert_eq!(tier, Tier::Memory);

        coordinator.cache().clear();
        let (again, tier) = coordinator.load_page_traced(None, 1).await.unwrap();
        assert_eq!(tier, Tier::Durable);
        assert_eq!(again, first);
        assert_eq!(remote.request_count(), 1);

        let stats = coordinator.stats();
        assert_eq!(stats.memory_hits, 1);
        assert_eq!(stats.durable_hits, 1);
        assert_eq!(stats.remote_fetches, 1);
    }

    #[tokio::test]
    async fn test_child_pages_carry_parent() {
        let remote = Arc::new(SyntheticSource::new(policy()));
        let coordinator = coordinator(Arc::new(SledNodeStore::temporary()), remote);
        let parent = NodeKey::from("5");
        let page = coordinator.load_page(Some(&parent), 100).await.unwrap();
        assert_eq!(page.total, 1_000);
        assert!(!page.has_more);
        assert!(page
            .nodes
            .iter()
            .all(|n| n.parent_key.as_ref() == Some(&parent)));
    }

    #[tokio::test]
    async fn test_durable_failure_falls_back_to_remote() {
        let remote = Arc::new(SyntheticSource::new(policy()));
        let coordinator = coordinator(Arc::new(FailingStore), remote.clone());

        let page = coordinator.load_page(None, 2).await.unwrap();
        assert_eq!(page.nodes[0].key.as_str(), "10");
        let again = coordinator.load_page(None, 2).await.unwrap();
        assert_eq!(again, page);
        assert_eq!(remote.request_count(), 1);

        let stats = coordinator.stats();
        // One failed read and one failed write
        assert_eq!(stats.durable_errors, 2);
        assert_eq!(stats.memory_hits, 1);
    }

    #[tokio::test]
    async fn test_out_of_order_durable_page_is_a_miss() {
        let durable = Arc::new(SledNodeStore::temporary());
        let remote = Arc::new(SyntheticSource::new(policy()));
        let coordinator = coordinator(durable.clone(), remote.clone());

        // Only page 3 is persisted; a skip-based read of page 1 would return it
        coordinator.load_page(None, 3).await.unwrap();
        coordinator.cache().clear();

        let (page, tier) = coordinator.load_page_traced(None, 1).await.unwrap();
        assert_eq!(tier, Tier::Remote);
        assert_eq!(page.nodes[0].key.as_str(), "0");
    }

    #[tokio::test]
    async fn test_invalid_page_rejected() {
        let remote = Arc::new(SyntheticSource::new(policy()));
        let coordinator = coordinator(Arc::new(SledNodeStore::temporary()), remote);
        let err = coordinator.load_page(None, 0).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidPage { page: 0, .. }));
    }

    #[tokio::test]
    async fn test_slow_remote_times_out_as_retryable() {
        let remote = Arc::new(SyntheticSource::with_latency(
            policy(),
            Duration::from_millis(500),
        ));
        let coordinator = PagingCoordinator::new(
            Arc::new(MemoryCache::new(&CacheConfig::default())),
            Arc::new(SledNodeStore::temporary()),
            remote,
            policy(),
            Duration::from_millis(20),
        );

        let err = coordinator.load_page(None, 1).await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::PageUnavailable {
                source: FetchError::Timeout { .. },
                ..
            }
        ));
        assert!(err.is_retryable());
        assert!(coordinator.cache().is_empty());
        assert_eq!(coordinator.stats().remote_failures, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_clear_during_fetch_skips_write_back() {
        let durable = Arc::new(SledNodeStore::temporary());
        let remote = Arc::new(SyntheticSource::with_latency(
            policy(),
            Duration::from_millis(200),
        ));
        let coordinator = Arc::new(coordinator(durable.clone(), remote));

        let load = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.load_page(None, 1).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        coordinator.clear().await.unwrap();

        // The caller still gets its page; neither tier keeps it
        assert_eq!(load.await.unwrap().unwrap().nodes.len(), 10);
        assert!(coordinator.cache().is_empty());
        assert_eq!(durable.record_count().await.unwrap(), 0);
    }

    #[test]
    fn test_complete_page_rules() {
        let node = |key: &str| Node {
            id: key.to_string(),
            key: NodeKey::from(key),
            title: String::new(),
            is_leaf: false,
            parent_key: None,
        };
        let request = PageRequest::new(None, 2, 3);
        let full = StoredPage {
            nodes: vec![node("3"), node("4"), node("5")],
            has_more: true,
        };
        assert!(is_complete_page(&full, &request, 100));

        let short = StoredPage {
            nodes: vec![node("3"), node("4")],
            has_more: false,
        };
        assert!(!is_complete_page(&short, &request, 100));
        // The same short page is complete when it reaches the total
        assert!(is_complete_page(&short, &request, 5));

        let shifted = StoredPage {
            nodes: vec![node("6"), node("7"), node("8")],
            has_more: false,
        };
        assert!(!is_complete_page(&shifted, &request, 100));
        assert!(!is_complete_page(&StoredPage::default(), &request, 100));
    }
}

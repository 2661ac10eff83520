use lazytree::cache::{CacheConfig, ManualClock, MemoryCache};
use lazytree::coordinator::PagingCoordinator;
use lazytree::remote::SyntheticSource;
use lazytree::scroll::{ScrollConfig, ScrollController};
use lazytree::session::TreeSession;
use lazytree::store::{DurableStore, SledNodeStore};
use lazytree::tree::{TreeStore, TreeWorker};
use lazytree::types::PagingPolicy;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub struct Harness {
    pub session: TreeSession,
    pub source: Arc<SyntheticSource>,
    pub store: Arc<SledNodeStore>,
    pub clock: Arc<ManualClock>,
}

pub fn small_policy() -> PagingPolicy {
    PagingPolicy {
        page_size: 10,
        root_total: 35,
        child_total: 25,
    }
}

pub fn coordinator(
    store: Arc<dyn DurableStore>,
    source: Arc<SyntheticSource>,
    policy: PagingPolicy,
    clock: Arc<ManualClock>,
) -> Arc<PagingCoordinator> {
    let cache = MemoryCache::with_clock(&CacheConfig::default(), clock);
    Arc::new(PagingCoordinator::new(
        Arc::new(cache),
        store,
        source,
        policy,
        Duration::from_secs(5),
    ))
}

/// Session over a sled store at `dir` and a zero-latency synthetic source
pub fn harness(dir: &Path, policy: PagingPolicy) -> Harness {
    harness_with_latency(dir, policy, Duration::ZERO)
}

pub fn harness_with_latency(dir: &Path, policy: PagingPolicy, latency: Duration) -> Harness {
    let store = Arc::new(SledNodeStore::open(dir.join("store")));
    let source = Arc::new(SyntheticSource::with_latency(policy, latency));
    let clock = Arc::new(ManualClock::new());
    let coordinator = coordinator(store.clone(), source.clone(), policy, clock.clone());
    let (tree, _task) = TreeWorker::spawn(TreeStore::new());
    let session = TreeSession::new(
        coordinator,
        tree,
        ScrollController::new(ScrollConfig::default()),
    );
    Harness {
        session,
        source,
        store,
        clock,
    }
}

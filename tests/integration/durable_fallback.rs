use lazytree::coordinator::Tier;
use lazytree::store::DurableStore;
use lazytree::types::{NodeKey, PagingPolicy};
use std::time::Duration;
use tempfile::TempDir;

use crate::support::harness;

#[tokio::test]
async fn memory_hit_skips_remote() {
    let temp = TempDir::new().unwrap();
    let h = harness(temp.path(), PagingPolicy::default());
    let coordinator = h.session.coordinator();

    let (_, tier) = coordinator.load_page_traced(None, 1).await.unwrap();
    assert_eq!(tier, Tier::Remote);
    let (page, tier) = coordinator.load_page_traced(None, 1).await.unwrap();
    assert_eq!(tier, Tier::Memory);
    assert_eq!(page.nodes.len(), 50);
    assert_eq!(h.source.request_count(), 1);
}

#[tokio::test]
async fn expired_memory_entry_falls_back_to_durable() {
    let temp = TempDir::new().unwrap();
    let h = harness(temp.path(), PagingPolicy::default());
    let coordinator = h.session.coordinator();
    let parent = NodeKey::from("12");

    coordinator.load_page(Some(&parent), 1).await.unwrap();
    h.clock.advance(Duration::from_secs(301));

    let (page, tier) = coordinator
        .load_page_traced(Some(&parent), 1)
        .await
        .unwrap();
    assert_eq!(tier, Tier::Durable);
    assert_eq!(page.nodes[0].key.as_str(), "12-0");
    assert!(page.has_more);
    assert_eq!(h.source.request_count(), 1);

    // Durable hit repopulated the memory tier
    let (_, tier) = coordinator
        .load_page_traced(Some(&parent), 1)
        .await
        .unwrap();
    assert_eq!(tier, Tier::Memory);
}

#[tokio::test]
async fn remote_pages_are_persisted_with_parent() {
    let temp = TempDir::new().unwrap();
    let h = harness(temp.path(), PagingPolicy::default());
    let parent = NodeKey::from("3");

    h.session
        .coordinator()
        .load_page(Some(&parent), 1)
        .await
        .unwrap();

    let stored = h.store.get_nodes(Some(&parent), 1, 50).await.unwrap();
    assert_eq!(stored.nodes.len(), 50);
    assert!(stored
        .nodes
        .iter()
        .all(|n| n.parent_key == Some(parent.clone())));
    assert!(h.store.get_nodes(None, 1, 50).await.unwrap().nodes.is_empty());
}

#[tokio::test]
async fn partially_stored_page_is_fetched_again() {
    let temp = TempDir::new().unwrap();
    let h = harness(temp.path(), PagingPolicy::default());
    let coordinator = h.session.coordinator();

    // Page 2 stored first; page 1 must not be served from page 2's records
    coordinator.load_page(None, 2).await.unwrap();
    coordinator.cache().clear();

    let (page, tier) = coordinator.load_page_traced(None, 1).await.unwrap();
    assert_eq!(tier, Tier::Remote);
    assert_eq!(page.nodes[0].key.as_str(), "0");

    coordinator.cache().clear();
    let (page, tier) = coordinator.load_page_traced(None, 2).await.unwrap();
    assert_eq!(tier, Tier::Durable);
    assert_eq!(page.nodes[0].key.as_str(), "50");
}

#[tokio::test]
async fn stats_track_each_tier() {
    let temp = TempDir::new().unwrap();
    let h = harness(temp.path(), PagingPolicy::default());
    let coordinator = h.session.coordinator();

    coordinator.load_page(None, 1).await.unwrap();
    coordinator.load_page(None, 1).await.unwrap();
    coordinator.cache().clear();
    coordinator.load_page(None, 1).await.unwrap();

    let stats = coordinator.stats();
    assert_eq!(stats.remote_fetches, 1);
    assert_eq!(stats.memory_hits, 1);
    assert_eq!(stats.durable_hits, 1);
    assert_eq!(stats.remote_failures, 0);
}

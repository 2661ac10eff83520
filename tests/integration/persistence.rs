use lazytree::coordinator::Tier;
use lazytree::store::{DurableStore, SledNodeStore};
use lazytree::types::{NodeKey, PagingPolicy};
use tempfile::TempDir;

use crate::support::harness;

#[tokio::test]
async fn pages_survive_session_restart() {
    let temp = TempDir::new().unwrap();
    {
        let h = harness(temp.path(), PagingPolicy::default());
        h.session.initialize().await.unwrap();
        h.session.expand(&NodeKey::from("4")).await.unwrap();
        h.store.flush().await.unwrap();
    }

    let h = harness(temp.path(), PagingPolicy::default());
    let coordinator = h.session.coordinator();
    let (_, tier) = coordinator.load_page_traced(None, 1).await.unwrap();
    assert_eq!(tier, Tier::Durable);
    let (children, tier) = coordinator
        .load_page_traced(Some(&NodeKey::from("4")), 1)
        .await
        .unwrap();
    assert_eq!(tier, Tier::Durable);
    assert_eq!(children.nodes[0].key.as_str(), "4-0");
    assert_eq!(h.source.request_count(), 0);
}

#[tokio::test]
async fn concurrent_first_use_opens_store_once() {
    let temp = TempDir::new().unwrap();
    let store = std::sync::Arc::new(SledNodeStore::open(temp.path().join("store")));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            store.get_nodes(None, 1, 10).await.unwrap()
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap().nodes.is_empty());
    }
    assert_eq!(store.initialization_count(), 1);
}

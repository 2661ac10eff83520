use lazytree::scroll::ScrollMetrics;
use lazytree::types::NodeKey;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use crate::support::{harness_with_latency, small_policy};

const LATENCY: Duration = Duration::from_millis(200);

fn near_end() -> ScrollMetrics {
    ScrollMetrics {
        scroll_top: 1450.0,
        client_height: 500.0,
        scroll_height: 2000.0,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn clear_discards_root_page_loading_at_the_time() {
    let temp = TempDir::new().unwrap();
    let h = Arc::new(harness_with_latency(temp.path(), small_policy(), LATENCY));
    h.session.initialize().await.unwrap();

    let scroll = {
        let h = h.clone();
        tokio::spawn(async move { h.session.on_scroll(&near_end()).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.session.clear().await.unwrap();

    assert_eq!(scroll.await.unwrap().unwrap(), None);
    assert_eq!(h.session.visible_len().await.unwrap(), 0);
    assert_eq!(h.session.controller().current_page(), 1);
    assert!(h.session.coordinator().cache().is_empty());
    assert_eq!(h.store.record_count().await.unwrap(), 0);

    // The session starts over from page 1
    h.session.initialize().await.unwrap();
    let rows = h.session.visible_nodes(0, 0).await.unwrap();
    assert_eq!(rows[0].node.key.as_str(), "0");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn clear_discards_children_loading_at_the_time() {
    let temp = TempDir::new().unwrap();
    let h = Arc::new(harness_with_latency(temp.path(), small_policy(), LATENCY));
    h.session.initialize().await.unwrap();

    let expand = {
        let h = h.clone();
        tokio::spawn(async move { h.session.expand(&NodeKey::from("3")).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.session.clear().await.unwrap();

    assert!(expand.await.unwrap().unwrap().is_empty());
    assert_eq!(h.session.visible_len().await.unwrap(), 0);
    assert!(h
        .session
        .tree()
        .get_children(NodeKey::from("3"))
        .await
        .unwrap()
        .is_empty());
    assert_eq!(h.store.record_count().await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_load_more_children_fetches_page_once() {
    let temp = TempDir::new().unwrap();
    let h = Arc::new(harness_with_latency(
        temp.path(),
        small_policy(),
        Duration::from_millis(100),
    ));
    h.session.initialize().await.unwrap();
    let parent = NodeKey::from("0");
    h.session.expand(&parent).await.unwrap();
    let before = h.source.request_count();

    let (first, second) = tokio::join!(
        h.session.load_more_children(&parent),
        h.session.load_more_children(&parent)
    );
    assert!(first.unwrap());
    assert!(second.unwrap());
    assert_eq!(h.source.request_count(), before + 1);

    let children = h.session.tree().get_children(parent.clone()).await.unwrap();
    assert_eq!(children.len(), 20);

    // The claim is released, so the next call proceeds to page 3
    assert!(!h.session.load_more_children(&parent).await.unwrap());
    assert_eq!(h.session.tree().get_children(parent).await.unwrap().len(), 25);
}

use lazytree::scroll::{LoadState, ScrollMetrics};
use tempfile::TempDir;

use crate::support::{harness, small_policy};

fn near_end() -> ScrollMetrics {
    ScrollMetrics {
        scroll_top: 1450.0,
        client_height: 500.0,
        scroll_height: 2000.0,
    }
}

#[tokio::test]
async fn scrolling_near_end_appends_next_root_page() {
    let temp = TempDir::new().unwrap();
    let h = harness(temp.path(), small_policy());
    h.session.initialize().await.unwrap();

    let far = ScrollMetrics {
        scroll_top: 0.0,
        client_height: 500.0,
        scroll_height: 2000.0,
    };
    assert_eq!(h.session.on_scroll(&far).await.unwrap(), None);

    assert_eq!(h.session.on_scroll(&near_end()).await.unwrap(), Some(10));
    assert_eq!(h.session.controller().current_page(), 2);
    let rows = h.session.visible_nodes(10, 10).await.unwrap();
    assert_eq!(rows[0].node.key.as_str(), "10");
}

#[tokio::test]
async fn scrolling_stops_when_roots_exhausted() {
    let temp = TempDir::new().unwrap();
    let h = harness(temp.path(), small_policy());
    h.session.initialize().await.unwrap();

    // 35 roots: pages 2, 3 full and page 4 holds the last 5
    assert_eq!(h.session.on_scroll(&near_end()).await.unwrap(), Some(10));
    assert_eq!(h.session.on_scroll(&near_end()).await.unwrap(), Some(10));
    assert_eq!(h.session.on_scroll(&near_end()).await.unwrap(), Some(5));
    assert_eq!(h.session.controller().state(), LoadState::Exhausted);

    let requests = h.source.request_count();
    assert_eq!(h.session.on_scroll(&near_end()).await.unwrap(), None);
    assert_eq!(h.source.request_count(), requests);
    assert_eq!(h.session.visible_len().await.unwrap(), 35);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_scroll_events_load_one_page() {
    let temp = TempDir::new().unwrap();
    let h = std::sync::Arc::new(harness(temp.path(), small_policy()));
    h.session.initialize().await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let h = h.clone();
        tasks.push(tokio::spawn(async move {
            h.session.on_scroll(&near_end()).await.unwrap()
        }));
    }
    let mut loads = 0;
    for task in tasks {
        if task.await.unwrap().is_some() {
            loads += 1;
        }
    }

    // Each completed load advances exactly one page
    let page = h.session.controller().current_page();
    assert_eq!(page, 1 + loads);
    assert_eq!(
        h.session.visible_len().await.unwrap(),
        (10 * page as usize).min(35)
    );
}

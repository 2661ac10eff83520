use lazytree::session::TreeEvent;
use lazytree::types::{NodeKey, PagingPolicy};
use tempfile::TempDir;

use crate::support::{harness, small_policy};

fn keys(rows: &[lazytree::VisibleNode]) -> Vec<(String, usize)> {
    rows.iter()
        .map(|r| (r.node.key.to_string(), r.level))
        .collect()
}

#[tokio::test]
async fn initialize_loads_first_root_page() {
    let temp = TempDir::new().unwrap();
    let h = harness(temp.path(), PagingPolicy::default());

    let response = h.session.initialize().await.unwrap();
    assert_eq!(response.nodes.len(), 50);
    assert_eq!(response.total, 400_000);
    assert!(response.has_more);
    assert_eq!(h.session.visible_len().await.unwrap(), 50);

    let rows = h.session.visible_nodes(0, 2).await.unwrap();
    assert_eq!(
        keys(&rows),
        vec![("0".into(), 0), ("1".into(), 0), ("2".into(), 0)]
    );
}

#[tokio::test]
async fn expand_inserts_children_after_parent() {
    let temp = TempDir::new().unwrap();
    let h = harness(temp.path(), small_policy());
    h.session.initialize().await.unwrap();

    let children = h.session.expand(&NodeKey::from("0")).await.unwrap();
    assert_eq!(children.len(), 10);
    assert!(children
        .iter()
        .all(|c| c.parent_key == Some(NodeKey::from("0"))));

    let rows = h.session.visible_nodes(0, 2).await.unwrap();
    assert_eq!(
        keys(&rows),
        vec![("0".into(), 0), ("0-0".into(), 1), ("0-1".into(), 1)]
    );
    let rows = h.session.visible_nodes(10, 11).await.unwrap();
    assert_eq!(keys(&rows), vec![("0-9".into(), 1), ("1".into(), 0)]);
    assert_eq!(rows[1].row_index, 11);
}

#[tokio::test]
async fn second_expand_is_answered_from_the_tree() {
    let temp = TempDir::new().unwrap();
    let h = harness(temp.path(), small_policy());
    h.session.initialize().await.unwrap();

    let key = NodeKey::from("2");
    h.session.expand(&key).await.unwrap();
    let before = h.source.request_count();
    let again = h.session.expand(&key).await.unwrap();
    assert_eq!(again.len(), 10);
    assert_eq!(h.source.request_count(), before);
}

#[tokio::test]
async fn nested_expansion_and_child_paging() {
    let temp = TempDir::new().unwrap();
    let h = harness(temp.path(), small_policy());
    h.session.initialize().await.unwrap();

    let parent = NodeKey::from("1");
    h.session.expand(&parent).await.unwrap();
    h.session.expand(&NodeKey::from("1-0")).await.unwrap();

    let rows = h.session.visible_nodes(1, 3).await.unwrap();
    assert_eq!(
        keys(&rows),
        vec![("1".into(), 0), ("1-0".into(), 1), ("1-0-0".into(), 2)]
    );

    // 25 children in pages of 10
    assert!(h.session.load_more_children(&parent).await.unwrap());
    assert!(!h.session.load_more_children(&parent).await.unwrap());
    assert!(!h.session.load_more_children(&parent).await.unwrap());
    let children = h.session.tree().get_children(parent).await.unwrap();
    assert_eq!(children.len(), 25);
    assert_eq!(children[24].key.as_str(), "1-24");
}

#[tokio::test]
async fn events_describe_tree_changes() {
    let temp = TempDir::new().unwrap();
    let h = harness(temp.path(), small_policy());
    let mut events = h.session.subscribe();

    h.session.initialize().await.unwrap();
    h.session.expand(&NodeKey::from("0")).await.unwrap();
    h.session.clear().await.unwrap();

    assert_eq!(
        events.recv().await.unwrap(),
        TreeEvent::RootsAppended { page: 1, count: 10 }
    );
    match events.recv().await.unwrap() {
        TreeEvent::ChildrenAttached { parent, children } => {
            assert_eq!(parent.as_str(), "0");
            assert_eq!(children.len(), 10);
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert_eq!(events.recv().await.unwrap(), TreeEvent::Cleared);
}

#[tokio::test]
async fn clear_resets_tree_controller_and_tiers() {
    let temp = TempDir::new().unwrap();
    let h = harness(temp.path(), small_policy());
    h.session.initialize().await.unwrap();
    h.session.expand(&NodeKey::from("0")).await.unwrap();

    h.session.clear().await.unwrap();
    assert_eq!(h.session.visible_len().await.unwrap(), 0);
    assert_eq!(h.session.controller().current_page(), 1);
    assert!(h.session.coordinator().cache().is_empty());
    assert_eq!(h.store.record_count().await.unwrap(), 0);

    let before = h.source.request_count();
    h.session.initialize().await.unwrap();
    assert_eq!(h.source.request_count(), before + 1);
}

//! Tree Store
//!
//! Flattened in-memory tree: a node table plus a parent -> ordered child keys
//! index. Answers visible-range queries with a pre-order, depth-aware walk.

pub mod worker;

use crate::types::{Node, NodeKey, VisibleNode};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::warn;

pub use worker::{TreeCommand, TreeHandle, TreeWorker};

/// Root ordering slot: numeric ordinal first, key as tiebreak
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct RootSlot {
    ordinal: u64,
    key: NodeKey,
}

impl RootSlot {
    fn for_key(key: &NodeKey) -> Self {
        Self {
            ordinal: key.ordinal().unwrap_or(u64::MAX),
            key: key.clone(),
        }
    }
}

/// Flattened tree store
#[derive(Debug, Default)]
pub struct TreeStore {
    nodes: HashMap<NodeKey, Node>,
    children: HashMap<NodeKey, Vec<NodeKey>>,
    roots: BTreeSet<RootSlot>,
}

impl TreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite node records by key
    pub fn add_nodes(&mut self, nodes: &[Node]) {
        for node in nodes {
            self.insert_node(node.with_parent(node.parent_key.as_ref()));
        }
    }

    /// Replace `parent`'s child list and insert the child records in one step
    pub fn set_children(&mut self, parent: &NodeKey, children: &[Node]) {
        let keys = children.iter().map(|child| child.key.clone()).collect();
        self.children.insert(parent.clone(), keys);
        for child in children {
            self.insert_node(child.with_parent(Some(parent)));
        }
    }

    /// Extend `parent`'s child list with a further page; already attached keys are skipped
    pub fn append_children(&mut self, parent: &NodeKey, children: &[Node]) {
        let list = self.children.entry(parent.clone()).or_default();
        let mut attached: HashSet<NodeKey> = list.iter().cloned().collect();
        for child in children {
            if attached.insert(child.key.clone()) {
                list.push(child.key.clone());
            }
        }
        for child in children {
            self.insert_node(child.with_parent(Some(parent)));
        }
    }

    pub fn get_node(&self, key: &NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    /// Children of `parent` in display order; empty when none are attached
    pub fn get_children(&self, parent: &NodeKey) -> Vec<Node> {
        let Some(keys) = self.children.get(parent) else {
            return Vec::new();
        };
        keys.iter()
            .filter_map(|key| {
                let node = self.nodes.get(key);
                if node.is_none() {
                    warn!(parent = %parent, child = %key, "Child key without node record");
                }
                node.cloned()
            })
            .collect()
    }

    pub fn has_children(&self, key: &NodeKey) -> bool {
        self.children.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Nodes whose pre-order position lies in `[start_index, end_index]`
    pub fn get_visible_nodes(&self, start_index: usize, end_index: usize) -> Vec<VisibleNode> {
        let mut visible = Vec::new();
        if start_index > end_index {
            return visible;
        }
        self.walk(|row_index, level, node| {
            if row_index > end_index {
                return false;
            }
            if row_index >= start_index {
                visible.push(VisibleNode {
                    node: node.clone(),
                    level,
                    row_index,
                });
            }
            true
        });
        visible
    }

    /// Total number of rows in the flattened view
    pub fn visible_len(&self) -> usize {
        let mut count = 0;
        self.walk(|_, _, _| {
            count += 1;
            true
        });
        count
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.children.clear();
        self.roots.clear();
    }

    fn insert_node(&mut self, node: Node) {
        let slot = RootSlot::for_key(&node.key);
        if node.is_root() {
            self.roots.insert(slot);
        } else {
            self.roots.remove(&slot);
        }
        self.nodes.insert(node.key.clone(), node);
    }

    /// Pre-order walk over every root; `visit(row_index, level, node)` returns
    /// false to stop. Child keys without a record are skipped with their subtree.
    fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(usize, usize, &Node) -> bool,
    {
        let mut row_index = 0;
        let mut stack: Vec<(&NodeKey, usize)> = Vec::new();

        for root in &self.roots {
            stack.push((&root.key, 0));
            while let Some((key, level)) = stack.pop() {
                let Some(node) = self.nodes.get(key) else {
                    warn!(key = %key, "Child key without node record, skipping subtree");
                    continue;
                };
                if !visit(row_index, level, node) {
                    return;
                }
                row_index += 1;

                if let Some(children) = self.children.get(key) {
                    stack.extend(children.iter().rev().map(|child| (child, level + 1)));
                }
            }
        }
    }
}

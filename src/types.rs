//! Core types for the lazy tree data layer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between hierarchical key segments.
pub const KEY_SEPARATOR: char = '-';

/// NodeKey: hierarchical, stable key of a tree node
///
/// A root's key is its zero-based index (`"42"`); a child's key is
/// `{parent}-{index}` (`"42-7"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(String);

impl NodeKey {
    pub fn new(key: impl Into<String>) -> Self {
        NodeKey(key.into())
    }

    /// Key of the root at `index`
    pub fn root(index: u64) -> Self {
        NodeKey(index.to_string())
    }

    /// Key of the `index`-th child of `parent`
    pub fn child(parent: &NodeKey, index: u64) -> Self {
        NodeKey(format!("{}{}{}", parent.0, KEY_SEPARATOR, index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Trailing sibling index, when the key follows the hierarchical format.
    pub fn ordinal(&self) -> Option<u64> {
        let last = self.0.rsplit(KEY_SEPARATOR).next()?;
        last.parse().ok()
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeKey {
    fn from(value: &str) -> Self {
        NodeKey(value.to_string())
    }
}

impl From<String> for NodeKey {
    fn from(value: String) -> Self {
        NodeKey(value)
    }
}

/// Tree node record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub key: NodeKey,
    pub title: String,
    pub is_leaf: bool,
    /// Parent key; `None` marks a root. Not part of the remote payload,
    /// stamped when a page is normalized.
    #[serde(default)]
    pub parent_key: Option<NodeKey>,
}

impl Node {
    pub fn is_root(&self) -> bool {
        self.parent_key.is_none()
    }

    /// Copy of this node keeping only the canonical fields and the given parent.
    pub fn with_parent(&self, parent: Option<&NodeKey>) -> Node {
        Node {
            id: self.id.clone(),
            key: self.key.clone(),
            title: self.title.clone(),
            is_leaf: self.is_leaf,
            parent_key: parent.cloned(),
        }
    }
}

/// A node positioned in the flattened view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleNode {
    #[serde(flatten)]
    pub node: Node,
    /// Depth in the tree; roots are level 0
    pub level: usize,
    /// Global pre-order row index
    pub row_index: usize,
}

/// Request for one page of a parent's children (or of the roots)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub parent: Option<NodeKey>,
    /// 1-based page number
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(parent: Option<NodeKey>, page: u32, page_size: u32) -> Self {
        Self {
            parent,
            page,
            page_size,
        }
    }

    /// Global index of the first node in this page
    pub fn first_ordinal(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// One page of nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse {
    pub nodes: Vec<Node>,
    pub total: u64,
    pub has_more: bool,
}

/// Page size and per-level totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingPolicy {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_root_total")]
    pub root_total: u64,
    #[serde(default = "default_child_total")]
    pub child_total: u64,
}

fn default_page_size() -> u32 {
    50
}

fn default_root_total() -> u64 {
    400_000
}

fn default_child_total() -> u64 {
    1_000
}

impl Default for PagingPolicy {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            root_total: default_root_total(),
            child_total: default_child_total(),
        }
    }
}

impl PagingPolicy {
    pub fn total_for(&self, parent: Option<&NodeKey>) -> u64 {
        match parent {
            None => self.root_total,
            Some(_) => self.child_total,
        }
    }

    pub fn has_more(&self, page: u32, total: u64) -> bool {
        u64::from(page) * u64::from(self.page_size) < total
    }

    pub fn request(&self, parent: Option<&NodeKey>, page: u32) -> PageRequest {
        PageRequest::new(parent.cloned(), page, self.page_size)
    }
}

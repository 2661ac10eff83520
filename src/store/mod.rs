//! Durable Store
//!
//! Second-tier node cache that survives process restarts. Records are keyed by
//! node key with a secondary index on the parent relation, so a parent's
//! children can be scanned page by page in sibling order.

pub mod persistence;

use crate::error::StorageError;
use crate::types::{Node, NodeKey};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use persistence::SledNodeStore;

/// Persisted node record: a node plus its parent relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredNode {
    pub id: String,
    pub key: String,
    pub title: String,
    pub is_leaf: bool,
    pub parent_id: Option<String>,
}

impl StoredNode {
    pub fn from_node(node: &Node, parent: Option<&NodeKey>) -> Self {
        Self {
            id: node.id.clone(),
            key: node.key.as_str().to_string(),
            title: node.title.clone(),
            is_leaf: node.is_leaf,
            parent_id: parent.map(|p| p.as_str().to_string()),
        }
    }

    pub fn into_node(self) -> Node {
        Node {
            id: self.id,
            key: NodeKey::new(self.key),
            title: self.title,
            is_leaf: self.is_leaf,
            parent_key: self.parent_id.map(NodeKey::new),
        }
    }
}

/// A window of a parent's stored children
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredPage {
    pub nodes: Vec<Node>,
    /// A matching record exists beyond the returned window
    pub has_more: bool,
}

/// Durable node store interface
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Upsert `nodes` under `parent` as one atomic batch
    async fn add_nodes(&self, nodes: &[Node], parent: Option<&NodeKey>) -> Result<(), StorageError>;

    /// Skip `(page - 1) * page_size` children of `parent`, return up to `page_size`
    async fn get_nodes(
        &self,
        parent: Option<&NodeKey>,
        page: u32,
        page_size: u32,
    ) -> Result<StoredPage, StorageError>;

    /// Remove every record
    async fn clear_all(&self) -> Result<(), StorageError>;
}

pub(crate) fn validate_page(page: u32, page_size: u32) -> Result<(), StorageError> {
    if page == 0 || page_size == 0 {
        return Err(StorageError::InvalidPage { page, page_size });
    }
    Ok(())
}

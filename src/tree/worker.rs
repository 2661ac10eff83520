//! Tree store worker
//!
//! Runs a [`TreeStore`] behind a command queue. The worker task is the only
//! writer, so a visible-range query never observes a child list without its
//! node records.

use super::TreeStore;
use crate::error::ApiError;
use crate::types::{Node, NodeKey, VisibleNode};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Default command queue depth
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Commands accepted by the tree worker
#[derive(Debug)]
pub enum TreeCommand {
    AddNodes {
        nodes: Vec<Node>,
        reply: oneshot::Sender<()>,
    },
    SetChildren {
        parent: NodeKey,
        children: Vec<Node>,
        reply: oneshot::Sender<Vec<Node>>,
    },
    AppendChildren {
        parent: NodeKey,
        children: Vec<Node>,
        reply: oneshot::Sender<Vec<Node>>,
    },
    GetNode {
        key: NodeKey,
        reply: oneshot::Sender<Option<Node>>,
    },
    GetChildren {
        parent: NodeKey,
        reply: oneshot::Sender<Vec<Node>>,
    },
    GetVisibleNodes {
        start_index: usize,
        end_index: usize,
        reply: oneshot::Sender<Vec<VisibleNode>>,
    },
    VisibleLen {
        reply: oneshot::Sender<usize>,
    },
    Clear {
        reply: oneshot::Sender<()>,
    },
}

/// Spawns the worker task
pub struct TreeWorker;

impl TreeWorker {
    /// Start a worker owning `store`. The task ends when every handle is dropped.
    pub fn spawn(store: TreeStore) -> (TreeHandle, JoinHandle<()>) {
        Self::spawn_with_capacity(store, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn spawn_with_capacity(store: TreeStore, capacity: usize) -> (TreeHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(Self::run(store, rx));
        (TreeHandle { tx }, handle)
    }

    async fn run(mut store: TreeStore, mut rx: mpsc::Receiver<TreeCommand>) {
        debug!("Tree worker started");
        while let Some(command) = rx.recv().await {
            Self::apply(&mut store, command);
        }
        info!(nodes = store.len(), "Tree worker stopped");
    }

    fn apply(store: &mut TreeStore, command: TreeCommand) {
        // A dropped receiver means the caller gave up waiting; nothing to do.
        match command {
            TreeCommand::AddNodes { nodes, reply } => {
                store.add_nodes(&nodes);
                let _ = reply.send(());
            }
            TreeCommand::SetChildren {
                parent,
                children,
                reply,
            } => {
                store.set_children(&parent, &children);
                let _ = reply.send(store.get_children(&parent));
            }
            TreeCommand::AppendChildren {
                parent,
                children,
                reply,
            } => {
                store.append_children(&parent, &children);
                let _ = reply.send(store.get_children(&parent));
            }
            TreeCommand::GetNode { key, reply } => {
                let _ = reply.send(store.get_node(&key).cloned());
            }
            TreeCommand::GetChildren { parent, reply } => {
                let _ = reply.send(store.get_children(&parent));
            }
            TreeCommand::GetVisibleNodes {
                start_index,
                end_index,
                reply,
            } => {
                let _ = reply.send(store.get_visible_nodes(start_index, end_index));
            }
            TreeCommand::VisibleLen { reply } => {
                let _ = reply.send(store.visible_len());
            }
            TreeCommand::Clear { reply } => {
                store.clear();
                let _ = reply.send(());
            }
        }
    }
}

/// Cloneable handle for sending commands to the tree worker
#[derive(Debug, Clone)]
pub struct TreeHandle {
    tx: mpsc::Sender<TreeCommand>,
}

impl TreeHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> TreeCommand,
    ) -> Result<T, ApiError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| ApiError::TreeUnavailable)?;
        response.await.map_err(|_| ApiError::TreeUnavailable)
    }

    pub async fn add_nodes(&self, nodes: Vec<Node>) -> Result<(), ApiError> {
        self.request(|reply| TreeCommand::AddNodes { nodes, reply })
            .await
    }

    /// Attach `children` to `parent`; returns the attached children
    pub async fn set_children(
        &self,
        parent: NodeKey,
        children: Vec<Node>,
    ) -> Result<Vec<Node>, ApiError> {
        self.request(|reply| TreeCommand::SetChildren {
            parent,
            children,
            reply,
        })
        .await
    }

    /// Append a further page of children; returns the full child list
    pub async fn append_children(
        &self,
        parent: NodeKey,
        children: Vec<Node>,
    ) -> Result<Vec<Node>, ApiError> {
        self.request(|reply| TreeCommand::AppendChildren {
            parent,
            children,
            reply,
        })
        .await
    }

    pub async fn get_node(&self, key: NodeKey) -> Result<Option<Node>, ApiError> {
        self.request(|reply| TreeCommand::GetNode { key, reply }).await
    }

    pub async fn get_children(&self, parent: NodeKey) -> Result<Vec<Node>, ApiError> {
        self.request(|reply| TreeCommand::GetChildren { parent, reply })
            .await
    }

    pub async fn get_visible_nodes(
        &self,
        start_index: usize,
        end_index: usize,
    ) -> Result<Vec<VisibleNode>, ApiError> {
        self.request(|reply| TreeCommand::GetVisibleNodes {
            start_index,
            end_index,
            reply,
        })
        .await
    }

    pub async fn visible_len(&self) -> Result<usize, ApiError> {
        self.request(|reply| TreeCommand::VisibleLen { reply }).await
    }

    pub async fn clear(&self) -> Result<(), ApiError> {
        self.request(|reply| TreeCommand::Clear { reply }).await
    }
}

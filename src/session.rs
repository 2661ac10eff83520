//! Tree session
//!
//! Entry points for the rendering consumer: visible-range queries, node
//! expansion and scroll notifications. Wires the paging coordinator, the tree
//! worker and the scroll controller together for one session.

use crate::coordinator::PagingCoordinator;
use crate::error::ApiError;
use crate::scroll::{ScrollController, ScrollMetrics};
use crate::tree::TreeHandle;
use crate::types::{Node, NodeKey, PageResponse, VisibleNode};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

const EVENT_CAPACITY: usize = 64;

/// Notifications for the rendering consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    RootsAppended { page: u32, count: usize },
    ChildrenAttached { parent: NodeKey, children: Vec<Node> },
    Cleared,
}

#[derive(Debug, Clone, Copy)]
struct ChildPaging {
    loaded_page: u32,
    has_more: bool,
    /// A further page is being fetched
    loading: bool,
}

pub struct TreeSession {
    coordinator: Arc<PagingCoordinator>,
    tree: TreeHandle,
    controller: ScrollController,
    child_pages: Mutex<HashMap<NodeKey, ChildPaging>>,
    events: broadcast::Sender<TreeEvent>,
    /// Bumped by `clear`; loads started earlier drop their results
    generation: AtomicU64,
    /// Tree write-backs hold it shared, `clear` exclusively
    write_gate: RwLock<()>,
}

impl TreeSession {
    pub fn new(
        coordinator: Arc<PagingCoordinator>,
        tree: TreeHandle,
        controller: ScrollController,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            coordinator,
            tree,
            controller,
            child_pages: Mutex::new(HashMap::new()),
            events,
            generation: AtomicU64::new(0),
            write_gate: RwLock::new(()),
        }
    }

    pub fn coordinator(&self) -> &PagingCoordinator {
        &self.coordinator
    }

    pub fn controller(&self) -> &ScrollController {
        &self.controller
    }

    pub fn tree(&self) -> &TreeHandle {
        &self.tree
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.events.subscribe()
    }

    /// Load the initial root page into the tree
    pub async fn initialize(&self) -> Result<PageResponse, ApiError> {
        let page = self.controller.initial_page();
        let generation = self.generation();
        let response = self.coordinator.load_page(None, page).await?;
        let _gate = self.write_gate.read().await;
        if !self.is_current(generation) {
            debug!(page, "Session cleared during initial load, discarding page");
            return Ok(response);
        }
        self.tree.add_nodes(response.nodes.clone()).await?;
        info!(page, count = response.nodes.len(), "Tree session initialized");
        self.emit(TreeEvent::RootsAppended {
            page,
            count: response.nodes.len(),
        });
        Ok(response)
    }

    pub async fn visible_nodes(
        &self,
        start_index: usize,
        end_index: usize,
    ) -> Result<Vec<VisibleNode>, ApiError> {
        self.tree.get_visible_nodes(start_index, end_index).await
    }

    pub async fn visible_len(&self) -> Result<usize, ApiError> {
        self.tree.visible_len().await
    }

    /// Attach the first page of `key`'s children. Leaves and already expanded
    /// nodes are answered from the tree without fetching.
    pub async fn expand(&self, key: &NodeKey) -> Result<Vec<Node>, ApiError> {
        if let Some(node) = self.tree.get_node(key.clone()).await? {
            if node.is_leaf {
                return Ok(Vec::new());
            }
        }
        if self.child_pages.lock().contains_key(key) {
            return self.tree.get_children(key.clone()).await;
        }

        let generation = self.generation();
        let response = self.coordinator.load_page(Some(key), 1).await?;
        let gate = self.write_gate.read().await;
        if !self.is_current(generation) {
            debug!(parent = %key, "Session cleared during expand, discarding children");
            return Ok(Vec::new());
        }
        let children = self
            .tree
            .set_children(key.clone(), response.nodes)
            .await?;
        self.child_pages.lock().insert(
            key.clone(),
            ChildPaging {
                loaded_page: 1,
                has_more: response.has_more,
                loading: false,
            },
        );
        drop(gate);

        debug!(parent = %key, count = children.len(), "Children attached");
        self.emit(TreeEvent::ChildrenAttached {
            parent: key.clone(),
            children: children.clone(),
        });
        Ok(children)
    }

    /// Append the next page of `key`'s children; returns whether more remain.
    /// A call made while another is fetching the same parent returns without fetching.
    pub async fn load_more_children(&self, key: &NodeKey) -> Result<bool, ApiError> {
        let claimed = {
            let mut pages = self.child_pages.lock();
            match pages.get_mut(key) {
                None => None,
                Some(paging) if paging.loading || !paging.has_more => {
                    return Ok(paging.has_more)
                }
                Some(paging) => {
                    paging.loading = true;
                    Some(paging.loaded_page + 1)
                }
            }
        };
        let Some(page) = claimed else {
            self.expand(key).await?;
            return Ok(self
                .child_pages
                .lock()
                .get(key)
                .map(|p| p.has_more)
                .unwrap_or(false));
        };

        let generation = self.generation();
        let claim = ChildClaim {
            pages: &self.child_pages,
            key,
            done: false,
        };
        let response = self.coordinator.load_page(Some(key), page).await?;
        let gate = self.write_gate.read().await;
        if !self.is_current(generation) {
            debug!(parent = %key, page, "Session cleared during child load, discarding page");
            return Ok(false);
        }
        let children = self
            .tree
            .append_children(key.clone(), response.nodes)
            .await?;
        claim.finish(page, response.has_more);
        drop(gate);

        self.emit(TreeEvent::ChildrenAttached {
            parent: key.clone(),
            children,
        });
        Ok(response.has_more)
    }

    /// Scroll notification; appends the next root page when near the end.
    /// Returns the number of roots added, or `None` if no load ran.
    pub async fn on_scroll(&self, metrics: &ScrollMetrics) -> Result<Option<usize>, ApiError> {
        let coordinator = &self.coordinator;
        let tree = &self.tree;
        let events = &self.events;
        let generation = self.generation();
        let current = &self.generation;
        let write_gate = &self.write_gate;

        let loaded = self
            .controller
            .on_scroll(metrics, |page| async move {
                let response = coordinator.load_page(None, page).await?;
                let has_more = response.has_more;
                let _gate = write_gate.read().await;
                if current.load(Ordering::SeqCst) != generation {
                    debug!(page, "Session cleared during root load, discarding page");
                    return Ok::<_, ApiError>((None, has_more));
                }
                let count = response.nodes.len();
                tree.add_nodes(response.nodes).await?;
                let _ = events.send(TreeEvent::RootsAppended { page, count });
                Ok((Some(count), has_more))
            })
            .await?;
        Ok(loaded.flatten())
    }

    /// Drop every tier's contents and return to the initial page
    pub async fn clear(&self) -> Result<(), ApiError> {
        let _gate = self.write_gate.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.tree.clear().await?;
        self.coordinator.clear().await?;
        self.controller.reset();
        self.child_pages.lock().clear();
        self.emit(TreeEvent::Cleared);
        Ok(())
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn emit(&self, event: TreeEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// In-flight claim on a parent's next child page; released unchanged on drop
struct ChildClaim<'a> {
    pages: &'a Mutex<HashMap<NodeKey, ChildPaging>>,
    key: &'a NodeKey,
    done: bool,
}

impl ChildClaim<'_> {
    fn finish(mut self, page: u32, has_more: bool) {
        if let Some(paging) = self.pages.lock().get_mut(self.key) {
            paging.loaded_page = page;
            paging.has_more = has_more;
            paging.loading = false;
        }
        self.done = true;
    }
}

impl Drop for ChildClaim<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if let Some(paging) = self.pages.lock().get_mut(self.key) {
            paging.loading = false;
        }
    }
}

//! Scroll/Load Controller
//!
//! Tracks the current root page and decides when the next page is due.
//! `Idle -> Loading -> Idle`, or `Exhausted` once the source reports no more.
//! At most one load is in flight; scroll events during a load are ignored.

use crate::error::ApiError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Controller configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScrollConfig {
    /// Distance to the end of content below which the next page loads
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Page already loaded when the view starts
    #[serde(default = "default_initial_page")]
    pub initial_page: u32,
}

fn default_threshold() -> f64 {
    80.0
}

fn default_initial_page() -> u32 {
    1
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            initial_page: default_initial_page(),
        }
    }
}

/// Scroll position reported by the view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub client_height: f64,
    pub scroll_height: f64,
}

impl ScrollMetrics {
    pub fn distance_to_end(&self) -> f64 {
        self.scroll_height - self.scroll_top - self.client_height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Exhausted,
}

#[derive(Debug)]
struct ControllerState {
    current_page: u32,
    has_more: bool,
    loading: bool,
    /// Bumped by reset so loads started before it cannot touch the new state
    generation: u64,
}

/// Scroll-driven pager; clones share state
#[derive(Debug, Clone)]
pub struct ScrollController {
    config: ScrollConfig,
    state: Arc<Mutex<ControllerState>>,
}

impl ScrollController {
    pub fn new(config: ScrollConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(ControllerState {
                current_page: config.initial_page,
                has_more: true,
                loading: false,
                generation: 0,
            })),
        }
    }

    pub fn initial_page(&self) -> u32 {
        self.config.initial_page
    }

    pub fn current_page(&self) -> u32 {
        self.state.lock().current_page
    }

    pub fn has_more(&self) -> bool {
        self.state.lock().has_more
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().loading
    }

    pub fn state(&self) -> LoadState {
        let state = self.state.lock();
        if state.loading {
            LoadState::Loading
        } else if !state.has_more {
            LoadState::Exhausted
        } else {
            LoadState::Idle
        }
    }

    pub fn is_near_end(&self, metrics: &ScrollMetrics) -> bool {
        metrics.distance_to_end() < self.config.threshold
    }

    /// Claim the in-flight slot for the next page
    pub fn try_begin(&self) -> Option<LoadTicket> {
        let mut state = self.state.lock();
        if state.loading || !state.has_more {
            return None;
        }
        state.loading = true;
        Some(LoadTicket {
            state: Arc::clone(&self.state),
            page: state.current_page + 1,
            generation: state.generation,
            finished: false,
        })
    }

    /// Back to the initial page with `has_more` set; any in-flight load is forgotten
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.current_page = self.config.initial_page;
        state.has_more = true;
        state.loading = false;
        state.generation += 1;
    }

    /// Load the next page if `metrics` is within the threshold and no load is running.
    ///
    /// `load_more` receives the page number and yields its result plus the
    /// source's `has_more`. Returns `Ok(None)` when no load was started.
    pub async fn on_scroll<T, F, Fut>(
        &self,
        metrics: &ScrollMetrics,
        load_more: F,
    ) -> Result<Option<T>, ApiError>
    where
        F: FnOnce(u32) -> Fut,
        Fut: Future<Output = Result<(T, bool), ApiError>>,
    {
        if !self.is_near_end(metrics) {
            return Ok(None);
        }
        let Some(ticket) = self.try_begin() else {
            return Ok(None);
        };

        debug!(page = ticket.page(), "Loading next page");
        let (items, has_more) = load_more(ticket.page()).await?;
        ticket.complete(has_more);
        Ok(Some(items))
    }
}

/// Exclusive right to load one page. Completing advances the page counter by
/// one; dropping without completing returns the controller to idle unchanged.
#[derive(Debug)]
pub struct LoadTicket {
    state: Arc<Mutex<ControllerState>>,
    page: u32,
    generation: u64,
    finished: bool,
}

impl LoadTicket {
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn complete(mut self, has_more: bool) {
        let mut state = self.state.lock();
        if state.generation == self.generation {
            state.current_page += 1;
            state.has_more = has_more;
            state.loading = false;
        }
        self.finished = true;
    }
}

impl Drop for LoadTicket {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut state = self.state.lock();
        if state.generation == self.generation {
            state.loading = false;
        }
    }
}

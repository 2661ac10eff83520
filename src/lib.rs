//! Lazytree: lazily expanded virtual tree data layer
//!
//! Serves a very large, lazily loaded hierarchy to a virtualized list view.
//! Pages of nodes are looked up in a bounded TTL memory cache, then a durable
//! sled store, then the remote source, and are assembled into a flattened tree
//! that answers pre-order visible-range queries.

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod remote;
pub mod scroll;
pub mod session;
pub mod store;
pub mod tooling;
pub mod tree;
pub mod types;

pub use coordinator::PagingCoordinator;
pub use error::ApiError;
pub use session::{TreeEvent, TreeSession};
pub use types::{Node, NodeKey, PageRequest, PageResponse, VisibleNode};

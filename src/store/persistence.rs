//! Sled-backed durable node store.
//!
//! Layout:
//! - `nodes`: node key -> bincode(StoredNode)
//! - `by_parent`: parent bucket | ordinal (big-endian) | node key -> node key
//! - `meta`: schema version
//!
//! Opening is lazy and single-flight: the first operation opens the database on a
//! blocking thread and every concurrent caller awaits that same open.

use super::{validate_page, DurableStore, StoredNode, StoredPage};
use crate::error::StorageError;
use crate::types::{Node, NodeKey};
use async_trait::async_trait;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
};
use sled::Transactional;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Bump whenever StoredNode or the index layout changes.
pub const SCHEMA_VERSION: u32 = 1;

const NODES_TREE: &str = "nodes";
const BY_PARENT_TREE: &str = "by_parent";
const META_TREE: &str = "meta";
const SCHEMA_KEY: &[u8] = b"schema_version";

const ROOT_BUCKET_TAG: u8 = 0;
const CHILD_BUCKET_TAG: u8 = 1;

#[derive(Debug, Clone)]
enum StoreLocation {
    Path(PathBuf),
    Temporary,
}

#[derive(Clone)]
struct StoreHandles {
    db: sled::Db,
    nodes: sled::Tree,
    by_parent: sled::Tree,
}

impl StoreHandles {
    fn open(location: StoreLocation) -> Result<Self, StorageError> {
        let db = match location {
            StoreLocation::Path(path) => {
                std::fs::create_dir_all(&path)?;
                sled::open(&path)?
            }
            StoreLocation::Temporary => sled::Config::new().temporary(true).open()?,
        };
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, StorageError> {
        let nodes = db.open_tree(NODES_TREE)?;
        let by_parent = db.open_tree(BY_PARENT_TREE)?;
        let meta = db.open_tree(META_TREE)?;

        let current = SCHEMA_VERSION.to_be_bytes();
        let stored = meta.get(SCHEMA_KEY)?;
        if stored.as_deref() != Some(&current[..]) {
            if stored.is_some() {
                warn!(
                    expected = SCHEMA_VERSION,
                    "Durable store schema changed, discarding cached records"
                );
            }
            nodes.clear()?;
            by_parent.clear()?;
            meta.insert(SCHEMA_KEY, &current[..])?;
        }

        Ok(Self {
            db,
            nodes,
            by_parent,
        })
    }
}

/// Durable store on top of sled
pub struct SledNodeStore {
    location: StoreLocation,
    handles: OnceCell<StoreHandles>,
    initializations: AtomicUsize,
}

impl SledNodeStore {
    /// Store rooted at `path`; opened on first use
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            location: StoreLocation::Path(path.into()),
            handles: OnceCell::new(),
            initializations: AtomicUsize::new(0),
        }
    }

    /// Store backed by a temporary database removed on drop
    pub fn temporary() -> Self {
        Self {
            location: StoreLocation::Temporary,
            handles: OnceCell::new(),
            initializations: AtomicUsize::new(0),
        }
    }

    /// Wrap an already opened database
    pub fn from_db(db: sled::Db) -> Result<Self, StorageError> {
        let handles = StoreHandles::from_db(db)?;
        Ok(Self {
            location: StoreLocation::Temporary,
            handles: OnceCell::new_with(Some(handles)),
            initializations: AtomicUsize::new(0),
        })
    }

    /// How many times the database open ran
    pub fn initialization_count(&self) -> usize {
        self.initializations.load(Ordering::SeqCst)
    }

    async fn handles(&self) -> Result<&StoreHandles, StorageError> {
        self.handles
            .get_or_try_init(|| async {
                self.initializations.fetch_add(1, Ordering::SeqCst);
                let location = self.location.clone();
                let handles = tokio::task::spawn_blocking(move || StoreHandles::open(location))
                    .await
                    .map_err(|e| StorageError::Task(e.to_string()))??;
                info!(location = ?self.location, "Durable store opened");
                Ok::<_, StorageError>(handles)
            })
            .await
    }

    /// Number of stored node records
    pub async fn record_count(&self) -> Result<usize, StorageError> {
        Ok(self.handles().await?.nodes.len())
    }

    pub async fn flush(&self) -> Result<(), StorageError> {
        self.handles().await?.db.flush_async().await?;
        Ok(())
    }
}

struct EncodedRecord {
    key: String,
    value: Vec<u8>,
    index_key: Vec<u8>,
}

fn parent_bucket(parent: Option<&str>) -> Vec<u8> {
    match parent {
        None => vec![ROOT_BUCKET_TAG],
        Some(parent) => {
            let mut bucket = Vec::with_capacity(5 + parent.len());
            bucket.push(CHILD_BUCKET_TAG);
            bucket.extend_from_slice(&(parent.len() as u32).to_be_bytes());
            bucket.extend_from_slice(parent.as_bytes());
            bucket
        }
    }
}

/// Non-numeric keys sort after numbered siblings, by key.
fn index_key(parent: Option<&str>, key: &str) -> Vec<u8> {
    let ordinal = NodeKey::from(key).ordinal().unwrap_or(u64::MAX);
    let mut index = parent_bucket(parent);
    index.extend_from_slice(&ordinal.to_be_bytes());
    index.extend_from_slice(key.as_bytes());
    index
}

fn encode_batch(nodes: &[Node], parent: Option<&NodeKey>) -> Result<Vec<EncodedRecord>, StorageError> {
    nodes
        .iter()
        .map(|node| {
            let record = StoredNode::from_node(node, parent);
            let value =
                bincode::serialize(&record).map_err(|e| StorageError::Encode(e.to_string()))?;
            let index_key = index_key(record.parent_id.as_deref(), &record.key);
            Ok(EncodedRecord {
                key: record.key,
                value,
                index_key,
            })
        })
        .collect()
}

fn decode_record(bytes: &[u8]) -> Result<StoredNode, StorageError> {
    bincode::deserialize(bytes).map_err(|e| StorageError::Decode(e.to_string()))
}

fn write_batch(handles: &StoreHandles, batch: &[EncodedRecord]) -> Result<(), StorageError> {
    let result = (&handles.nodes, &handles.by_parent).transaction(
        |(nodes, by_parent)| -> ConflictableTransactionResult<(), StorageError> {
            for record in batch {
                let previous = nodes.insert(record.key.as_bytes(), record.value.as_slice())?;
                if let Some(previous) = previous {
                    let old =
                        decode_record(&previous).map_err(ConflictableTransactionError::Abort)?;
                    let old_index = index_key(old.parent_id.as_deref(), &old.key);
                    if old_index != record.index_key {
                        by_parent.remove(old_index)?;
                    }
                }
                by_parent.insert(record.index_key.as_slice(), record.key.as_bytes())?;
            }
            Ok(())
        },
    );

    result.map_err(|e| match e {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => StorageError::Sled(e),
    })
}

fn read_page(
    handles: &StoreHandles,
    parent: Option<&str>,
    page: u32,
    page_size: u32,
) -> Result<StoredPage, StorageError> {
    let mut skip = u64::from(page - 1) * u64::from(page_size);
    let page_size = page_size as usize;
    let mut nodes = Vec::with_capacity(page_size);

    for entry in handles.by_parent.scan_prefix(parent_bucket(parent)) {
        let (_, primary) = entry?;
        if skip > 0 {
            skip -= 1;
            continue;
        }
        if nodes.len() >= page_size {
            return Ok(StoredPage {
                nodes,
                has_more: true,
            });
        }
        match handles.nodes.get(&primary)? {
            Some(bytes) => nodes.push(decode_record(&bytes)?.into_node()),
            None => warn!(
                key = %String::from_utf8_lossy(&primary),
                "Index entry without node record"
            ),
        }
    }

    Ok(StoredPage {
        nodes,
        has_more: false,
    })
}

#[async_trait]
impl DurableStore for SledNodeStore {
    async fn add_nodes(&self, nodes: &[Node], parent: Option<&NodeKey>) -> Result<(), StorageError> {
        if nodes.is_empty() {
            return Ok(());
        }
        let handles = self.handles().await?.clone();
        let batch = encode_batch(nodes, parent)?;
        let count = batch.len();

        tokio::task::spawn_blocking(move || write_batch(&handles, &batch))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))??;

        debug!(parent = ?parent, count, "Persisted node batch");
        Ok(())
    }

    async fn get_nodes(
        &self,
        parent: Option<&NodeKey>,
        page: u32,
        page_size: u32,
    ) -> Result<StoredPage, StorageError> {
        validate_page(page, page_size)?;
        let handles = self.handles().await?.clone();
        let parent = parent.map(|p| p.as_str().to_string());

        tokio::task::spawn_blocking(move || read_page(&handles, parent.as_deref(), page, page_size))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))?
    }

    async fn clear_all(&self) -> Result<(), StorageError> {
        let handles = self.handles().await?.clone();
        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            handles.nodes.clear()?;
            handles.by_parent.clear()?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))??;

        info!("Durable store cleared");
        Ok(())
    }
}

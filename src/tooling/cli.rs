//! CLI Tooling
//!
//! Builds one tree session from layered configuration and runs a single
//! command against it. Commands return their rendered output as a string.

use crate::cache::MemoryCache;
use crate::config::{ConfigLoader, LazyTreeConfig};
use crate::coordinator::{PagingCoordinator, Tier};
use crate::error::{ApiError, StorageError};
use crate::remote::{HttpRemoteSource, RemoteSource, SyntheticSource};
use crate::scroll::{ScrollController, ScrollMetrics};
use crate::session::TreeSession;
use crate::store::SledNodeStore;
use crate::tree::{TreeStore, TreeWorker};
use crate::types::{Node, NodeKey, VisibleNode};
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::Table;
use futures::future::try_join_all;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// Lazytree CLI - inspect a lazily loaded virtual tree
#[derive(Parser)]
#[command(name = "lazytree")]
#[command(about = "Page, expand and render a lazily loaded tree through its cache tiers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (overrides the global config file)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Durable store directory
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Base URL of the node service (default: in-process synthetic source)
    #[arg(long)]
    pub remote: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve one page through memory, durable store and remote
    Page {
        /// Parent key; omit for the root level
        #[arg(long)]
        parent: Option<String>,
        /// 1-based page number
        #[arg(long, default_value = "1")]
        page: u32,
    },
    /// Render a range of the flattened tree
    Visible {
        #[arg(long, default_value = "0")]
        start: usize,
        #[arg(long, default_value = "20")]
        end: usize,
        /// Expand these keys before rendering
        #[arg(long)]
        expand: Vec<String>,
        /// Root pages to load before rendering
        #[arg(long, default_value = "1")]
        pages: u32,
    },
    /// Load and show the first page of a node's children
    Expand { key: String },
    /// Simulate scrolling to the end of the list
    Scroll {
        #[arg(long, default_value = "1")]
        times: u32,
    },
    /// Clear the memory cache and the durable store
    Clear {
        /// Skip confirmation
        #[arg(long)]
        yes: bool,
    },
    /// Print the effective configuration
    Config,
}

/// Scroll position at the very end of the content
const AT_END: ScrollMetrics = ScrollMetrics {
    scroll_top: 0.0,
    client_height: 0.0,
    scroll_height: 0.0,
};

/// CLI context holding one session
pub struct CliContext {
    config: LazyTreeConfig,
    format: OutputFormat,
    store_path: PathBuf,
    session: TreeSession,
    _tree_worker: JoinHandle<()>,
}

impl CliContext {
    /// Create a new CLI context; must be called inside a tokio runtime
    pub fn new(cli: &Cli) -> Result<Self, ApiError> {
        let mut config = match &cli.config {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(None)?,
        };
        if let Some(store) = &cli.store {
            config.storage.path = Some(store.clone());
        }
        if let Some(remote) = &cli.remote {
            config.remote.base_url = Some(remote.clone());
        }
        config.validate()?;

        let store_path = config.storage.resolve_path()?;
        std::fs::create_dir_all(&store_path)
            .map_err(|e| ApiError::StorageError(StorageError::IoError(e)))?;
        let durable = Arc::new(SledNodeStore::open(store_path.clone()));

        let remote: Arc<dyn RemoteSource> = match &config.remote.base_url {
            Some(url) => Arc::new(HttpRemoteSource::new(url.clone())),
            None => Arc::new(SyntheticSource::with_latency(
                config.paging,
                Duration::from_millis(config.remote.synthetic_latency_ms),
            )),
        };

        let coordinator = Arc::new(PagingCoordinator::new(
            Arc::new(MemoryCache::new(&config.cache)),
            durable,
            remote,
            config.paging,
            Duration::from_millis(config.remote.timeout_ms),
        ));
        let (tree, worker) = TreeWorker::spawn(TreeStore::new());
        let session = TreeSession::new(coordinator, tree, ScrollController::new(config.scroll));

        info!(store = %store_path.display(), remote = ?config.remote.base_url, "CLI session ready");

        Ok(Self {
            config,
            format: cli.format,
            store_path,
            session,
            _tree_worker: worker,
        })
    }

    pub fn session(&self) -> &TreeSession {
        &self.session
    }

    /// Execute a CLI command
    pub async fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Page { parent, page } => {
                self.handle_page(parent.as_deref().map(NodeKey::from), *page)
                    .await
            }
            Commands::Visible {
                start,
                end,
                expand,
                pages,
            } => self.handle_visible(*start, *end, expand, *pages).await,
            Commands::Expand { key } => self.handle_expand(NodeKey::from(key.as_str())).await,
            Commands::Scroll { times } => self.handle_scroll(*times).await,
            Commands::Clear { yes } => self.handle_clear(*yes).await,
            Commands::Config => toml::to_string_pretty(&self.config)
                .map_err(|e| ApiError::ConfigError(format!("Failed to render config: {}", e))),
        }
    }

    async fn handle_page(&self, parent: Option<NodeKey>, page: u32) -> Result<String, ApiError> {
        let (response, tier) = self
            .session
            .coordinator()
            .load_page_traced(parent.as_ref(), page)
            .await?;

        if self.format == OutputFormat::Json {
            return to_json(&json!({
                "parent": parent,
                "page": page,
                "tier": tier_name(tier),
                "total": response.total,
                "hasMore": response.has_more,
                "nodes": response.nodes,
            }));
        }

        let mut output = format!(
            "Page {} of {} from {} ({} of {} total, more: {})\n",
            page,
            parent.as_ref().map(NodeKey::as_str).unwrap_or("roots"),
            tier_name(tier),
            response.nodes.len(),
            response.total,
            response.has_more
        );
        output.push_str(&node_table(&response.nodes));
        Ok(output)
    }

    async fn handle_visible(
        &self,
        start: usize,
        end: usize,
        expand: &[String],
        pages: u32,
    ) -> Result<String, ApiError> {
        self.session.initialize().await?;
        for _ in 1..pages {
            if self.session.on_scroll(&AT_END).await?.is_none() {
                break;
            }
        }

        let keys: Vec<NodeKey> = expand.iter().map(|k| NodeKey::from(k.as_str())).collect();
        try_join_all(keys.iter().map(|key| self.session.expand(key))).await?;

        let visible = self.session.visible_nodes(start, end).await?;
        if self.format == OutputFormat::Json {
            return to_json(&visible);
        }

        let total = self.session.visible_len().await?;
        let mut output = format!("Rows {}..={} of {}\n", start, end, total);
        output.push_str(&visible_table(&visible));
        Ok(output)
    }

    async fn handle_expand(&self, key: NodeKey) -> Result<String, ApiError> {
        let children = self.session.expand(&key).await?;
        if self.format == OutputFormat::Json {
            return to_json(&json!({ "parent": key, "children": children }));
        }
        let mut output = format!("{} children of {}\n", children.len(), key);
        output.push_str(&node_table(&children));
        Ok(output)
    }

    async fn handle_scroll(&self, times: u32) -> Result<String, ApiError> {
        self.session.initialize().await?;
        let mut loaded = Vec::new();
        for _ in 0..times {
            match self.session.on_scroll(&AT_END).await? {
                Some(count) => loaded.push(count),
                None => break,
            }
        }

        let controller = self.session.controller();
        let rows = self.session.visible_len().await?;
        if self.format == OutputFormat::Json {
            return to_json(&json!({
                "loadedPages": loaded,
                "currentPage": controller.current_page(),
                "hasMore": controller.has_more(),
                "rows": rows,
            }));
        }
        Ok(format!(
            "Loaded {} page(s); current page {}, {} rows, more: {}",
            loaded.len(),
            controller.current_page(),
            rows,
            controller.has_more()
        ))
    }

    async fn handle_clear(&self, yes: bool) -> Result<String, ApiError> {
        if !yes {
            use dialoguer::Confirm;
            let confirmed = Confirm::new()
                .with_prompt(format!(
                    "Clear cached pages in {}?",
                    self.store_path.display()
                ))
                .interact()
                .map_err(|e| ApiError::ConfigError(format!("Failed to get user input: {}", e)))?;

            if !confirmed {
                return Ok("Clear cancelled".to_string());
            }
        }

        self.session.clear().await?;
        Ok(format!("Cleared {}", self.store_path.display()))
    }
}

fn tier_name(tier: Tier) -> &'static str {
    match tier {
        Tier::Memory => "memory",
        Tier::Durable => "durable",
        Tier::Remote => "remote",
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::StorageError(StorageError::Encode(e.to_string())))
}

fn node_table(nodes: &[Node]) -> String {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Key", "Title", "Leaf"]);
    for node in nodes {
        table.add_row(vec![
            node.key.to_string(),
            node.title.clone(),
            node.is_leaf.to_string(),
        ]);
    }
    table.to_string()
}

fn visible_table(visible: &[VisibleNode]) -> String {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Row", "Level", "Title"]);
    for entry in visible {
        table.add_row(vec![
            entry.row_index.to_string(),
            entry.level.to_string(),
            format!("{}{}", "  ".repeat(entry.level), entry.node.title),
        ]);
    }
    table.to_string()
}

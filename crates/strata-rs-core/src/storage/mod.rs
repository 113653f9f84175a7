//! `AgentStorage`: the framework-facing storage adapter.
//!
//! Every operation is a short sequence of row store calls. The adapter
//! keeps no state of its own beyond the store handle and its options.

mod messages;
mod snapshots;
mod tables;
mod telemetry;
mod threads;

pub use messages::MessageWindow;
pub use telemetry::{EvalFilter, TraceQuery};
pub use threads::ThreadDraft;

use std::sync::Arc;
use strata_rs_config::StrataConfig;
use strata_rs_protocol::RecencyLimit;
use strata_rs_store::RowStore;

/// Tunables taken from `StrataConfig`.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageOptions {
    /// Recency limit for window requests that do not set one.
    pub default_recency: RecencyLimit,
    pub thread_page_size: usize,
    pub trace_page_size: usize,
    pub clear_page_size: usize,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self::from(&StrataConfig::default())
    }
}

impl From<&StrataConfig> for StorageOptions {
    fn from(config: &StrataConfig) -> Self {
        Self {
            default_recency: config.window.last_messages,
            thread_page_size: config.pagination.thread_page_size,
            trace_page_size: config.pagination.trace_page_size,
            clear_page_size: config.pagination.clear_page_size,
        }
    }
}

/// Storage adapter over a row store.
#[derive(Clone)]
pub struct AgentStorage {
    store: Arc<dyn RowStore>,
    options: StorageOptions,
}

impl AgentStorage {
    /// Adapter with default options.
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self::with_options(store, StorageOptions::default())
    }

    pub fn with_options(store: Arc<dyn RowStore>, options: StorageOptions) -> Self {
        Self { store, options }
    }

    /// Underlying row store.
    pub fn store(&self) -> &Arc<dyn RowStore> {
        &self.store
    }

    pub fn options(&self) -> &StorageOptions {
        &self.options
    }
}

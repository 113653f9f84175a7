//! Public surface for Strata.
//!
//! Re-exports the building blocks and wires a configuration into a ready
//! `AgentStorage`. The `strata` binary is a thin shell over `cli`.

pub mod cli;

/// Re-export for convenience.
pub use strata_rs_config as config;
pub use strata_rs_core as core;
/// Re-export for convenience.
pub use strata_rs_protocol as protocol;
pub use strata_rs_store as store;

use anyhow::Context;
use log::info;
use std::sync::Arc;
use strata_rs_config::{StorageBackend, StrataConfig};
use strata_rs_core::{AgentStorage, StorageOptions};
use strata_rs_store::{FileStore, InMemoryStore, RowStore};

/// Initialize logging through env_logger; level comes from `RUST_LOG`.
pub fn init_logging() {
    let _ = env_logger::builder()
        .format_timestamp_millis()
        .parse_default_env()
        .try_init();
}

/// Build the storage adapter described by `config`.
pub fn open_storage(config: &StrataConfig) -> anyhow::Result<AgentStorage> {
    let store: Arc<dyn RowStore> = match config.storage.backend {
        StorageBackend::Memory => {
            info!("using in-memory store");
            Arc::new(InMemoryStore::new())
        }
        StorageBackend::File => {
            let root = config
                .storage
                .data_dir()
                .context("failed to resolve data directory")?;
            info!("using file store (root={})", root.display());
            Arc::new(
                FileStore::open(&root)
                    .with_context(|| format!("failed to open store at {}", root.display()))?,
            )
        }
    };
    Ok(AgentStorage::with_options(store, StorageOptions::from(config)))
}

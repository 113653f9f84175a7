//! Document-store boundary for Strata.
//!
//! `RowStore` is the narrow interface the adapter talks to: keyed lookups,
//! ordered scans, per-thread sequence range scans, cursor pagination, and
//! atomic message append with store-assigned sequence numbers. Two backends
//! are provided: `InMemoryStore` and the JSONL-persisted `FileStore`.

pub mod document;
pub mod error;
pub mod file;
pub mod memory;
pub mod schema;
pub mod store;

/// Store error type.
pub use error::StoreError;
/// Document shapes persisted by the store.
pub use document::{
    DocId, Document, EvalDocument, MessageDocument, NewMessageDocument, SnapshotDocument,
    StoredDocument, ThreadDocument, TraceDocument,
};
/// Store backends.
pub use file::FileStore;
pub use memory::InMemoryStore;
/// Table schema validation.
pub use schema::{FieldKind, FieldSpec, table_fields, validate_table_schema};
/// Store interface and query types.
pub use store::{
    Cursor, DocumentPatch, IndexQuery, Order, Page, RowStore, ScanSource, SnapshotPatch,
    ThreadPatch, UniqueKey,
};

//! Error types for store operations.

use crate::document::DocId;
use strata_rs_protocol::TableKind;

/// Errors returned by row store backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No document with this id exists.
    #[error("document not found: {0}")]
    DocumentNotFound(DocId),
    /// The operation is not available for the table.
    #[error("unsupported operation {operation} on table {table}")]
    Unsupported {
        table: TableKind,
        operation: &'static str,
    },
    /// A document was routed to the wrong table.
    #[error("table mismatch: expected {expected}, found {found}")]
    TableMismatch { expected: TableKind, found: TableKind },
    /// A unique key is already taken.
    #[error("duplicate key in {table}: {key}")]
    DuplicateKey { table: TableKind, key: String },
    /// A pagination cursor could not be decoded.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
    /// A declared table schema disagrees with the store schema.
    #[error("schema mismatch for {table}: {message}")]
    SchemaMismatch { table: TableKind, message: String },
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Backend fault not covered by the other variants.
    #[error("store fault: {0}")]
    Fault(String),
}

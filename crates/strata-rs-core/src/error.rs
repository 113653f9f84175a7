//! Error types for the storage adapter.

use strata_rs_protocol::TableKind;
use strata_rs_store::StoreError;
use thiserror::Error;

/// Failures converting between framework rows and store documents.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// Stored inline bytes are not valid base64.
    #[error("invalid base64 in {field}: {source}")]
    InvalidBase64 {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },
    /// Epoch milliseconds outside the representable date range.
    #[error("timestamp out of range: {0}")]
    TimestampOutOfRange(i64),
    /// A serialized JSON field could not be read or written.
    #[error("invalid json in {field}: {source}")]
    Json {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown role: {0}")]
    UnknownRole(String),
    #[error("unknown message type: {0}")]
    UnknownKind(String),
    /// A structured field has an unexpected shape.
    #[error("invalid {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
    /// A document from another table reached a decoder.
    #[error("expected a {expected} document, found {found}")]
    WrongTable { expected: TableKind, found: TableKind },
}

/// Errors returned by `AgentStorage`.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Thread id is unknown.
    #[error("thread not found: {0}")]
    ThreadNotFound(String),
    /// Message id is unknown.
    #[error("message not found: {0}")]
    MessageNotFound(String),
    /// The thread belongs to another resource.
    #[error("thread {thread_id} belongs to resource {actual}, not {requested}")]
    ResourceMismatch {
        thread_id: String,
        requested: String,
        actual: String,
    },
    /// A batch row does not belong to the batch table.
    #[error("row for {found} in a {expected} batch")]
    TableMismatch { expected: TableKind, found: TableKind },
    /// Operation not available for the table.
    #[error("unsupported operation {operation} on table {table}")]
    Unsupported {
        table: TableKind,
        operation: &'static str,
    },
    /// Query parameters that cannot select anything.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error(transparent)]
    Transcode(#[from] TranscodeError),
    /// Row store fault, passed through untouched.
    #[error(transparent)]
    Store(#[from] StoreError),
}

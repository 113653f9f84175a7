//! Row types shared between the agent framework and the storage adapter.
//!
//! Everything in this crate is the framework's view of persisted state:
//! timestamps are `DateTime<Utc>`, binary content is raw bytes, and JSON
//! payloads are structured values. The document-store shapes live in
//! `strata-rs-store`.

mod content;
mod rows;
mod table;
mod window;

pub use content::{ContentPart, DataContent, MessageContent};
pub use rows::{
    EvalRow, Message, MessageKind, NewMessage, Role, Thread, ThreadUpdate, TraceRow,
    WorkflowSnapshot,
};
pub use table::{ColumnSpec, ColumnType, LoadedRow, Row, RowKey, TableKind, UnknownTableError};
pub use window::{Anchor, DEFAULT_RECENCY_LIMIT, MessageWindowRequest, RecencyLimit};

/// Identifier of a thread.
pub type ThreadId = String;
/// Identifier of a message, unique across all threads.
pub type MessageId = String;
/// Identifier of the external owner of a thread.
pub type ResourceId = String;

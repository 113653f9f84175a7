//! The `RowStore` interface and its query types.

use crate::document::{DocId, Document, MessageDocument, NewMessageDocument, StoredDocument};
use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use strata_rs_protocol::TableKind;

/// Unique key of a document in a keyed table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UniqueKey {
    Snapshot {
        workflow_name: String,
        run_id: String,
    },
    Message(String),
    Thread(String),
    Trace(String),
}

impl UniqueKey {
    /// Table addressed by this key.
    pub fn table(&self) -> TableKind {
        match self {
            UniqueKey::Snapshot { .. } => TableKind::WorkflowSnapshot,
            UniqueKey::Message(_) => TableKind::Messages,
            UniqueKey::Thread(_) => TableKind::Threads,
            UniqueKey::Trace(_) => TableKind::Traces,
        }
    }
}

impl fmt::Display for UniqueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniqueKey::Snapshot {
                workflow_name,
                run_id,
            } => write!(f, "{workflow_name}/{run_id}"),
            UniqueKey::Message(id) | UniqueKey::Thread(id) | UniqueKey::Trace(id) => {
                f.write_str(id)
            }
        }
    }
}

/// Secondary-index lookups supported by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexQuery {
    /// Messages of a thread, ordered by thread order.
    MessagesByThread { thread_id: String },
    /// Threads owned by a resource, ordered by document id.
    ThreadsByResource { resource_id: String },
    /// Evaluations recorded for an agent, ordered by document id.
    EvalsByAgent { agent_name: String },
}

impl IndexQuery {
    /// Table the index belongs to.
    pub fn table(&self) -> TableKind {
        match self {
            IndexQuery::MessagesByThread { .. } => TableKind::Messages,
            IndexQuery::ThreadsByResource { .. } => TableKind::Threads,
            IndexQuery::EvalsByAgent { .. } => TableKind::Evals,
        }
    }
}

/// What a paginated scan walks over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanSource {
    Table(TableKind),
    Index(IndexQuery),
}

impl ScanSource {
    pub fn table(&self) -> TableKind {
        match self {
            ScanSource::Table(table) => *table,
            ScanSource::Index(query) => query.table(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

/// Opaque continuation token returned by `paginate`.
///
/// Encodes the last document id handed out; the empty cursor starts a scan.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Cursor positioned after `doc_id`.
    pub fn after(doc_id: DocId) -> Self {
        Cursor(doc_id.to_string())
    }

    /// Decode the last document id, `None` for a fresh cursor.
    pub fn position(&self) -> Result<Option<DocId>, StoreError> {
        if self.0.is_empty() {
            return Ok(None);
        }
        self.0
            .strip_prefix("doc:")
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(|id| Some(DocId(id)))
            .ok_or_else(|| StoreError::InvalidCursor(self.0.clone()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Cursor {
    fn from(value: String) -> Self {
        Cursor(value)
    }
}

/// One page of a paginated scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub continue_cursor: Cursor,
    pub is_done: bool,
}

/// Field updates applied to a thread document.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadPatch {
    pub title: Option<String>,
    pub metadata: Option<String>,
    pub updated_at: i64,
}

/// Field updates applied to a snapshot document.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotPatch {
    pub snapshot: String,
    pub updated_at: i64,
}

/// Partial update for a stored document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentPatch {
    Thread(ThreadPatch),
    Snapshot(SnapshotPatch),
}

impl DocumentPatch {
    pub fn table(&self) -> TableKind {
        match self {
            DocumentPatch::Thread(_) => TableKind::Threads,
            DocumentPatch::Snapshot(_) => TableKind::WorkflowSnapshot,
        }
    }
}

/// Document store consumed by the storage adapter.
///
/// Every method is a single round trip. Implementations must make
/// `append_messages` and `insert_many` atomic: either every document lands or
/// none does.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Insert one document. Messages must go through `append_messages`.
    async fn insert_one(&self, document: Document) -> Result<DocId, StoreError>;

    /// Insert documents that all belong to `table`.
    async fn insert_many(
        &self,
        table: TableKind,
        documents: Vec<Document>,
    ) -> Result<Vec<DocId>, StoreError>;

    /// Look a document up by its unique key.
    async fn get_by_key(&self, key: &UniqueKey) -> Result<Option<StoredDocument>, StoreError>;

    /// Read an index in the given order, optionally capped at `limit` rows.
    async fn scan(
        &self,
        query: IndexQuery,
        order: Order,
        limit: Option<usize>,
    ) -> Result<Vec<StoredDocument>, StoreError>;

    /// Messages of a thread with `low <= thread_order <= high`, ascending.
    async fn range_scan(
        &self,
        thread_id: &str,
        low: u64,
        high: u64,
    ) -> Result<Vec<MessageDocument>, StoreError>;

    /// Append messages, assigning each the next thread order of its thread.
    ///
    /// Orders start at 1 and grow by one per appended message.
    async fn append_messages(
        &self,
        messages: Vec<NewMessageDocument>,
    ) -> Result<Vec<MessageDocument>, StoreError>;

    /// Return one page of `source`, ordered by document id.
    async fn paginate(
        &self,
        source: ScanSource,
        cursor: Option<&Cursor>,
        page_size: usize,
    ) -> Result<Page<StoredDocument>, StoreError>;

    /// Apply a partial update.
    async fn patch(&self, doc_id: DocId, patch: DocumentPatch) -> Result<(), StoreError>;

    /// Replace a document wholesale, keeping its id.
    async fn replace(&self, doc_id: DocId, document: Document) -> Result<(), StoreError>;

    /// Remove a document.
    async fn delete(&self, doc_id: DocId) -> Result<(), StoreError>;
}

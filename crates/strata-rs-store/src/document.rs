//! Document shapes as the store persists them.
//!
//! Timestamps are epoch milliseconds and opaque JSON payloads are kept as
//! serialized text. Message content is stored as a structured value whose
//! binary parts are already text-encoded.

use crate::store::UniqueKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use strata_rs_protocol::TableKind;

/// Store-internal document identifier, unique across all tables.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct DocId(pub u64);

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc:{}", self.0)
    }
}

/// Workflow snapshot document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotDocument {
    pub workflow_name: String,
    pub run_id: String,
    /// Serialized JSON state.
    pub snapshot: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Evaluation document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalDocument {
    pub input: String,
    pub output: String,
    /// Serialized JSON result.
    pub result: String,
    pub agent_name: String,
    pub metric_name: String,
    pub instructions: String,
    /// Serialized JSON test metadata, absent for live evaluations.
    #[serde(default)]
    pub test_info: Option<String>,
    pub global_run_id: String,
    pub run_id: String,
    pub created_at: i64,
}

/// Message document with its assigned thread order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageDocument {
    pub id: String,
    pub thread_id: String,
    pub thread_order: u64,
    pub role: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: Value,
    pub created_at: i64,
}

/// Message document awaiting a thread order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewMessageDocument {
    pub id: String,
    pub thread_id: String,
    pub role: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: Value,
    pub created_at: i64,
}

impl NewMessageDocument {
    /// Attach the order assigned by the store.
    pub fn with_order(self, thread_order: u64) -> MessageDocument {
        MessageDocument {
            id: self.id,
            thread_id: self.thread_id,
            thread_order,
            role: self.role,
            kind: self.kind,
            content: self.content,
            created_at: self.created_at,
        }
    }
}

/// Thread document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreadDocument {
    pub id: String,
    pub resource_id: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Serialized JSON metadata object.
    #[serde(default)]
    pub metadata: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Trace span document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceDocument {
    pub id: String,
    #[serde(default)]
    pub parent_span_id: Option<String>,
    pub name: String,
    pub trace_id: String,
    pub scope: String,
    pub kind: i64,
    #[serde(default)]
    pub attributes: Option<Value>,
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub events: Option<Value>,
    #[serde(default)]
    pub links: Option<Value>,
    /// Serialized JSON extras.
    #[serde(default)]
    pub other: Option<String>,
    pub start_time: i64,
    pub end_time: i64,
    pub created_at: i64,
}

/// Any document, tagged with its table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "table", rename_all = "snake_case")]
pub enum Document {
    Snapshot(SnapshotDocument),
    Eval(EvalDocument),
    Message(MessageDocument),
    Thread(ThreadDocument),
    Trace(TraceDocument),
}

impl Document {
    /// Table the document lives in.
    pub fn table(&self) -> TableKind {
        match self {
            Document::Snapshot(_) => TableKind::WorkflowSnapshot,
            Document::Eval(_) => TableKind::Evals,
            Document::Message(_) => TableKind::Messages,
            Document::Thread(_) => TableKind::Threads,
            Document::Trace(_) => TableKind::Traces,
        }
    }

    /// Unique key of the document, if its table has one.
    pub fn unique_key(&self) -> Option<UniqueKey> {
        match self {
            Document::Snapshot(doc) => Some(UniqueKey::Snapshot {
                workflow_name: doc.workflow_name.clone(),
                run_id: doc.run_id.clone(),
            }),
            Document::Eval(_) => None,
            Document::Message(doc) => Some(UniqueKey::Message(doc.id.clone())),
            Document::Thread(doc) => Some(UniqueKey::Thread(doc.id.clone())),
            Document::Trace(doc) => Some(UniqueKey::Trace(doc.id.clone())),
        }
    }
}

/// Document together with its store id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredDocument {
    pub doc_id: DocId,
    pub document: Document,
}

impl StoredDocument {
    /// Return the message document, if this is one.
    pub fn into_message(self) -> Option<MessageDocument> {
        match self.document {
            Document::Message(doc) => Some(doc),
            _ => None,
        }
    }

    /// Return the thread document, if this is one.
    pub fn into_thread(self) -> Option<ThreadDocument> {
        match self.document {
            Document::Thread(doc) => Some(doc),
            _ => None,
        }
    }
}

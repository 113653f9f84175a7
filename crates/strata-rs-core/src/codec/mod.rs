//! Two-way mapping between framework rows and store documents.
//!
//! Structured JSON payloads that the store keeps as text (thread metadata,
//! eval results, snapshots, trace extras) are only guaranteed to come back
//! value-equal, not byte-equal.

pub mod content;
pub mod time;

use crate::error::TranscodeError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use strata_rs_protocol::{
    EvalRow, LoadedRow, Message, MessageKind, NewMessage, Role, Row, RowKey, TableKind, Thread,
    TraceRow, WorkflowSnapshot,
};
use strata_rs_store::{
    Document, EvalDocument, MessageDocument, NewMessageDocument, SnapshotDocument, ThreadDocument,
    TraceDocument, UniqueKey,
};
use time::{from_millis, to_millis};

/// Row type with a document counterpart.
pub trait Transcode: Sized {
    type Document;

    /// Table the document is stored in.
    const TABLE: TableKind;

    fn encode(&self) -> Result<Self::Document, TranscodeError>;

    fn decode(document: Self::Document) -> Result<Self, TranscodeError>;

    /// Decode from an untyped document.
    fn from_document(document: Document) -> Result<Self, TranscodeError>;
}

fn to_json_text<T: Serialize>(value: &T, field: &'static str) -> Result<String, TranscodeError> {
    serde_json::to_string(value).map_err(|source| TranscodeError::Json { field, source })
}

fn from_json_text<T: DeserializeOwned>(
    raw: &str,
    field: &'static str,
) -> Result<T, TranscodeError> {
    serde_json::from_str(raw).map_err(|source| TranscodeError::Json { field, source })
}

fn wrong_table(expected: TableKind, document: &Document) -> TranscodeError {
    TranscodeError::WrongTable {
        expected,
        found: document.table(),
    }
}

impl Transcode for Thread {
    type Document = ThreadDocument;
    const TABLE: TableKind = TableKind::Threads;

    fn encode(&self) -> Result<ThreadDocument, TranscodeError> {
        Ok(ThreadDocument {
            id: self.id.clone(),
            resource_id: self.resource_id.clone(),
            title: self.title.clone(),
            metadata: self
                .metadata
                .as_ref()
                .map(|metadata| to_json_text(metadata, "metadata"))
                .transpose()?,
            created_at: to_millis(self.created_at),
            updated_at: to_millis(self.updated_at),
        })
    }

    fn decode(document: ThreadDocument) -> Result<Self, TranscodeError> {
        Ok(Thread {
            id: document.id,
            resource_id: document.resource_id,
            title: document.title,
            metadata: document
                .metadata
                .as_deref()
                .map(|raw| from_json_text::<Map<String, Value>>(raw, "metadata"))
                .transpose()?,
            created_at: from_millis(document.created_at)?,
            updated_at: from_millis(document.updated_at)?,
        })
    }

    fn from_document(document: Document) -> Result<Self, TranscodeError> {
        match document {
            Document::Thread(doc) => Self::decode(doc),
            other => Err(wrong_table(Self::TABLE, &other)),
        }
    }
}

impl Transcode for Message {
    type Document = MessageDocument;
    const TABLE: TableKind = TableKind::Messages;

    fn encode(&self) -> Result<MessageDocument, TranscodeError> {
        Ok(MessageDocument {
            id: self.id.clone(),
            thread_id: self.thread_id.clone(),
            thread_order: self.sequence,
            role: self.role.as_str().to_string(),
            kind: self.kind.as_str().to_string(),
            content: content::encode_content(&self.content)?,
            created_at: to_millis(self.created_at),
        })
    }

    fn decode(document: MessageDocument) -> Result<Self, TranscodeError> {
        Ok(Message {
            id: document.id,
            thread_id: document.thread_id,
            sequence: document.thread_order,
            role: parse_role(&document.role)?,
            kind: parse_kind(&document.kind)?,
            content: content::decode_content(document.content)?,
            created_at: from_millis(document.created_at)?,
        })
    }

    fn from_document(document: Document) -> Result<Self, TranscodeError> {
        match document {
            Document::Message(doc) => Self::decode(doc),
            other => Err(wrong_table(Self::TABLE, &other)),
        }
    }
}

impl Transcode for EvalRow {
    type Document = EvalDocument;
    const TABLE: TableKind = TableKind::Evals;

    fn encode(&self) -> Result<EvalDocument, TranscodeError> {
        Ok(EvalDocument {
            input: self.input.clone(),
            output: self.output.clone(),
            result: to_json_text(&self.result, "result")?,
            agent_name: self.agent_name.clone(),
            metric_name: self.metric_name.clone(),
            instructions: self.instructions.clone(),
            test_info: self
                .test_info
                .as_ref()
                .map(|info| to_json_text(info, "test_info"))
                .transpose()?,
            global_run_id: self.global_run_id.clone(),
            run_id: self.run_id.clone(),
            created_at: to_millis(self.created_at),
        })
    }

    fn decode(document: EvalDocument) -> Result<Self, TranscodeError> {
        Ok(EvalRow {
            input: document.input,
            output: document.output,
            result: from_json_text(&document.result, "result")?,
            agent_name: document.agent_name,
            metric_name: document.metric_name,
            instructions: document.instructions,
            test_info: document
                .test_info
                .as_deref()
                .map(|raw| from_json_text(raw, "test_info"))
                .transpose()?,
            global_run_id: document.global_run_id,
            run_id: document.run_id,
            created_at: from_millis(document.created_at)?,
        })
    }

    fn from_document(document: Document) -> Result<Self, TranscodeError> {
        match document {
            Document::Eval(doc) => Self::decode(doc),
            other => Err(wrong_table(Self::TABLE, &other)),
        }
    }
}

impl Transcode for TraceRow {
    type Document = TraceDocument;
    const TABLE: TableKind = TableKind::Traces;

    fn encode(&self) -> Result<TraceDocument, TranscodeError> {
        Ok(TraceDocument {
            id: self.id.clone(),
            parent_span_id: self.parent_span_id.clone(),
            name: self.name.clone(),
            trace_id: self.trace_id.clone(),
            scope: self.scope.clone(),
            kind: self.kind,
            attributes: self.attributes.clone().map(Value::Object),
            status: self.status.clone(),
            events: self.events.clone().map(Value::Array),
            links: self.links.clone().map(Value::Array),
            other: self
                .other
                .as_ref()
                .map(|other| to_json_text(other, "other"))
                .transpose()?,
            start_time: self.start_time,
            end_time: self.end_time,
            created_at: to_millis(self.created_at),
        })
    }

    fn decode(document: TraceDocument) -> Result<Self, TranscodeError> {
        Ok(TraceRow {
            id: document.id,
            parent_span_id: document.parent_span_id,
            name: document.name,
            trace_id: document.trace_id,
            scope: document.scope,
            kind: document.kind,
            attributes: document
                .attributes
                .map(|value| match value {
                    Value::Object(map) => Ok(map),
                    _ => Err(invalid("attributes", "expected an object")),
                })
                .transpose()?,
            status: document.status,
            events: document.events.map(|value| expect_array(value, "events")).transpose()?,
            links: document.links.map(|value| expect_array(value, "links")).transpose()?,
            other: document
                .other
                .as_deref()
                .map(|raw| from_json_text(raw, "other"))
                .transpose()?,
            start_time: document.start_time,
            end_time: document.end_time,
            created_at: from_millis(document.created_at)?,
        })
    }

    fn from_document(document: Document) -> Result<Self, TranscodeError> {
        match document {
            Document::Trace(doc) => Self::decode(doc),
            other => Err(wrong_table(Self::TABLE, &other)),
        }
    }
}

impl Transcode for WorkflowSnapshot {
    type Document = SnapshotDocument;
    const TABLE: TableKind = TableKind::WorkflowSnapshot;

    fn encode(&self) -> Result<SnapshotDocument, TranscodeError> {
        Ok(SnapshotDocument {
            workflow_name: self.workflow_name.clone(),
            run_id: self.run_id.clone(),
            snapshot: to_json_text(&self.snapshot, "snapshot")?,
            created_at: to_millis(self.created_at),
            updated_at: to_millis(self.updated_at),
        })
    }

    fn decode(document: SnapshotDocument) -> Result<Self, TranscodeError> {
        Ok(WorkflowSnapshot {
            workflow_name: document.workflow_name,
            run_id: document.run_id,
            snapshot: from_json_text(&document.snapshot, "snapshot")?,
            created_at: from_millis(document.created_at)?,
            updated_at: from_millis(document.updated_at)?,
        })
    }

    fn from_document(document: Document) -> Result<Self, TranscodeError> {
        match document {
            Document::Snapshot(doc) => Self::decode(doc),
            other => Err(wrong_table(Self::TABLE, &other)),
        }
    }
}

fn invalid(field: &'static str, message: &str) -> TranscodeError {
    TranscodeError::InvalidField {
        field,
        message: message.to_string(),
    }
}

fn expect_array(value: Value, field: &'static str) -> Result<Vec<Value>, TranscodeError> {
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(invalid(field, "expected an array")),
    }
}

fn parse_role(raw: &str) -> Result<Role, TranscodeError> {
    raw.parse()
        .map_err(|_| TranscodeError::UnknownRole(raw.to_string()))
}

fn parse_kind(raw: &str) -> Result<MessageKind, TranscodeError> {
    raw.parse()
        .map_err(|_| TranscodeError::UnknownKind(raw.to_string()))
}

/// Encode a message awaiting its sequence.
pub fn encode_new_message(message: &NewMessage) -> Result<NewMessageDocument, TranscodeError> {
    Ok(NewMessageDocument {
        id: message.id.clone(),
        thread_id: message.thread_id.clone(),
        role: message.role.as_str().to_string(),
        kind: message.kind.as_str().to_string(),
        content: content::encode_content(&message.content)?,
        created_at: to_millis(message.created_at),
    })
}

/// A row ready for the store.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedRow {
    Document(Document),
    /// Messages must be appended so the store assigns their sequence.
    Message(NewMessageDocument),
}

/// Encode any insertable row.
pub fn encode_row(row: &Row) -> Result<EncodedRow, TranscodeError> {
    Ok(match row {
        Row::WorkflowSnapshot(snapshot) => EncodedRow::Document(Document::Snapshot(snapshot.encode()?)),
        Row::Eval(eval) => EncodedRow::Document(Document::Eval(eval.encode()?)),
        Row::Message(message) => EncodedRow::Message(encode_new_message(message)?),
        Row::Thread(thread) => EncodedRow::Document(Document::Thread(thread.encode()?)),
        Row::Trace(trace) => EncodedRow::Document(Document::Trace(trace.encode()?)),
    })
}

/// Store key for a row key.
pub fn unique_key(key: &RowKey) -> UniqueKey {
    match key {
        RowKey::WorkflowSnapshot {
            workflow_name,
            run_id,
        } => UniqueKey::Snapshot {
            workflow_name: workflow_name.clone(),
            run_id: run_id.clone(),
        },
        RowKey::Message(id) => UniqueKey::Message(id.clone()),
        RowKey::Thread(id) => UniqueKey::Thread(id.clone()),
        RowKey::Trace(id) => UniqueKey::Trace(id.clone()),
    }
}

/// Decode a document returned by a keyed load.
pub fn decode_loaded(document: Document) -> Result<LoadedRow, TranscodeError> {
    Ok(match document {
        Document::Snapshot(doc) => LoadedRow::WorkflowSnapshot(WorkflowSnapshot::decode(doc)?),
        Document::Message(doc) => LoadedRow::Message(Message::decode(doc)?),
        Document::Thread(doc) => LoadedRow::Thread(Thread::decode(doc)?),
        Document::Trace(doc) => LoadedRow::Trace(TraceRow::decode(doc)?),
        Document::Eval(_) => {
            return Err(invalid("document", "evaluation records have no unique key"));
        }
    })
}

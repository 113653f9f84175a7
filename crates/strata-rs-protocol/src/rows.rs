//! Framework row shapes for the five persisted record kinds.

use crate::content::MessageContent;
use crate::{MessageId, ResourceId, ThreadId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Speaker role for a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt or injected instruction.
    System,
    /// User-authored message.
    User,
    /// Assistant-authored message.
    Assistant,
    /// Tool output.
    Tool,
}

impl Role {
    /// Return the role as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "tool" => Ok(Role::Tool),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Message classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    Text,
    ToolCall,
    ToolResult,
}

impl MessageKind {
    /// Return the kind as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::ToolCall => "tool-call",
            MessageKind::ToolResult => "tool-result",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "text" => Ok(MessageKind::Text),
            "tool-call" => Ok(MessageKind::ToolCall),
            "tool-result" => Ok(MessageKind::ToolResult),
            other => Err(format!("unknown message type: {other}")),
        }
    }
}

/// Persisted message with its store-assigned position in the thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub thread_id: ThreadId,
    /// Position within the thread, assigned by the store on append.
    pub sequence: u64,
    pub role: Role,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: MessageContent,
    pub created_at: DateTime<Utc>,
}

/// Message that has not been appended yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub id: MessageId,
    pub thread_id: ThreadId,
    /// Owner used when the thread has to be created implicitly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<ResourceId>,
    pub role: Role,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: MessageContent,
    pub created_at: DateTime<Utc>,
}

impl NewMessage {
    /// Build a text message with a fresh id and the current time.
    pub fn text(thread_id: impl Into<String>, role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            thread_id: thread_id.into(),
            resource_id: None,
            role,
            kind: MessageKind::Text,
            content: MessageContent::Text(text.into()),
            created_at: Utc::now(),
        }
    }

    /// Attach the owning resource for implicit thread creation.
    pub fn with_resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Combine with a store-assigned sequence.
    pub fn into_message(self, sequence: u64) -> Message {
        Message {
            id: self.id,
            thread_id: self.thread_id,
            sequence,
            role: self.role,
            kind: self.kind,
            content: self.content,
            created_at: self.created_at,
        }
    }
}

/// Conversation container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: ThreadId,
    pub resource_id: ResourceId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial thread update; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ThreadUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

impl ThreadUpdate {
    /// True when the update would change nothing but `updatedAt`.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.metadata.is_none()
    }
}

/// Evaluation result recorded for an agent run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvalRow {
    pub input: String,
    pub output: String,
    pub result: Value,
    pub agent_name: String,
    pub metric_name: String,
    pub instructions: String,
    #[serde(default)]
    pub test_info: Option<Value>,
    pub global_run_id: String,
    pub run_id: String,
    pub created_at: DateTime<Utc>,
}

/// Trace span.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TraceRow {
    pub id: String,
    #[serde(default)]
    pub parent_span_id: Option<String>,
    pub name: String,
    pub trace_id: String,
    pub scope: String,
    pub kind: i64,
    #[serde(default)]
    pub attributes: Option<Map<String, Value>>,
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub events: Option<Vec<Value>>,
    #[serde(default)]
    pub links: Option<Vec<Value>>,
    #[serde(default)]
    pub other: Option<Value>,
    /// Span start in nanoseconds since the epoch.
    pub start_time: i64,
    /// Span end in nanoseconds since the epoch.
    pub end_time: i64,
    pub created_at: DateTime<Utc>,
}

/// Opaque workflow execution state, last write wins per (workflow, run).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSnapshot {
    pub workflow_name: String,
    pub run_id: String,
    pub snapshot: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//! Request types for reading a window of messages out of a thread.

use crate::{MessageId, ResourceId, ThreadId};
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Recency limit applied when a request leaves it unset.
pub const DEFAULT_RECENCY_LIMIT: usize = 40;

/// How many of the most recent messages to include.
///
/// Serialized as a count, or `false` to disable the recency window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecencyLimit {
    /// Include the last `n` messages.
    Last(usize),
    /// Include no recency rows.
    Disabled,
}

impl RecencyLimit {
    /// Number of rows the recency window asks for.
    pub fn count(&self) -> usize {
        match self {
            RecencyLimit::Last(count) => *count,
            RecencyLimit::Disabled => 0,
        }
    }
}

impl Default for RecencyLimit {
    fn default() -> Self {
        RecencyLimit::Last(DEFAULT_RECENCY_LIMIT)
    }
}

impl Serialize for RecencyLimit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RecencyLimit::Last(count) => serializer.serialize_u64(*count as u64),
            RecencyLimit::Disabled => serializer.serialize_bool(false),
        }
    }
}

impl<'de> Deserialize<'de> for RecencyLimit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Count(usize),
            Flag(bool),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Count(count) => Ok(RecencyLimit::Last(count)),
            Raw::Flag(false) => Ok(RecencyLimit::Disabled),
            Raw::Flag(true) => Err(de::Error::custom(
                "expected a non-negative message count or false",
            )),
        }
    }
}

/// Include a message plus surrounding context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Anchor {
    pub id: MessageId,
    /// Messages preceding the anchor to include.
    #[serde(default, alias = "withPreviousMessages")]
    pub before: u64,
    /// Messages following the anchor to include.
    #[serde(default, alias = "withNextMessages")]
    pub after: u64,
}

impl Anchor {
    /// Anchor with no surrounding context.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            before: 0,
            after: 0,
        }
    }

    /// Anchor with `before`/`after` context.
    pub fn with_context(id: impl Into<String>, before: u64, after: u64) -> Self {
        Self {
            id: id.into(),
            before,
            after,
        }
    }
}

/// Read request for a thread's message window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageWindowRequest {
    pub thread_id: ThreadId,
    /// When set, the thread must belong to this resource.
    #[serde(default)]
    pub resource_id: Option<ResourceId>,
    /// `None` falls back to the configured default.
    #[serde(default)]
    pub recency: Option<RecencyLimit>,
    #[serde(default)]
    pub anchors: Vec<Anchor>,
}

impl MessageWindowRequest {
    /// Request the default window for a thread.
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            resource_id: None,
            recency: None,
            anchors: Vec::new(),
        }
    }

    /// Override the recency limit.
    pub fn recency(mut self, recency: RecencyLimit) -> Self {
        self.recency = Some(recency);
        self
    }

    /// Add an anchor.
    pub fn anchor(mut self, anchor: Anchor) -> Self {
        self.anchors.push(anchor);
        self
    }

    /// Require the thread to belong to `resource_id`.
    pub fn owned_by(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }
}

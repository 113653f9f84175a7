//! Message append and window reads.

use super::AgentStorage;
use super::threads::ThreadDraft;
use crate::codec::{Transcode, encode_new_message};
use crate::error::StorageError;
use crate::window::MessageWindowResolver;
use log::{debug, info};
use std::collections::BTreeMap;
use strata_rs_protocol::{Message, MessageWindowRequest, NewMessage, Thread};
use strata_rs_store::UniqueKey;

/// Messages returned for a window request.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageWindow {
    /// Ascending by sequence, each message once.
    pub messages: Vec<Message>,
    /// Anchor ids that matched no message of the thread.
    pub missing_anchors: Vec<String>,
}

impl AgentStorage {
    /// Append a batch, returning the messages with their assigned sequences.
    ///
    /// A batch may span threads. A thread that does not exist yet is created
    /// when one of its messages names a resource; otherwise the whole batch
    /// fails with `ThreadNotFound` before anything is written. Implicit
    /// threads are created only once the append has succeeded.
    pub async fn save_messages(&self, messages: Vec<NewMessage>) -> Result<Vec<Message>, StorageError> {
        if messages.is_empty() {
            return Ok(Vec::new());
        }

        let mut owners: BTreeMap<&str, Option<&str>> = BTreeMap::new();
        for message in &messages {
            let owner = owners.entry(message.thread_id.as_str()).or_insert(None);
            if owner.is_none() {
                *owner = message.resource_id.as_deref();
            }
        }

        let mut drafts = Vec::new();
        for (thread_id, resource_id) in owners {
            if self.find_thread(thread_id).await?.is_some() {
                continue;
            }
            match resource_id {
                Some(resource_id) => drafts.push(ThreadDraft::new(resource_id).id(thread_id)),
                None => return Err(StorageError::ThreadNotFound(thread_id.to_string())),
            }
        }

        let documents = messages
            .iter()
            .map(encode_new_message)
            .collect::<Result<Vec<_>, _>>()?;
        let appended = self.store.append_messages(documents).await?;
        for draft in drafts {
            self.create_thread(draft).await?;
        }
        info!("saved messages (count={})", appended.len());
        appended
            .into_iter()
            .map(|document| Message::decode(document).map_err(StorageError::from))
            .collect()
    }

    /// Append one message.
    pub async fn add_message(&self, message: NewMessage) -> Result<Message, StorageError> {
        let id = message.id.clone();
        self.save_messages(vec![message])
            .await?
            .pop()
            .ok_or(StorageError::MessageNotFound(id))
    }

    /// Look a message up by id.
    pub async fn get_message(&self, message_id: &str) -> Result<Message, StorageError> {
        let stored = self
            .store
            .get_by_key(&UniqueKey::Message(message_id.to_string()))
            .await?
            .ok_or_else(|| StorageError::MessageNotFound(message_id.to_string()))?;
        Ok(Message::from_document(stored.document)?)
    }

    /// Recent messages of a thread plus context around each anchor.
    ///
    /// Unknown anchors are reported in `missing_anchors` and never fail the
    /// request. When the request names a resource the thread must exist and
    /// belong to it.
    pub async fn get_message_window(
        &self,
        request: MessageWindowRequest,
    ) -> Result<MessageWindow, StorageError> {
        if let Some(resource_id) = &request.resource_id {
            let stored = self
                .find_thread(&request.thread_id)
                .await?
                .ok_or_else(|| StorageError::ThreadNotFound(request.thread_id.clone()))?;
            let thread = Thread::from_document(stored.document)?;
            if &thread.resource_id != resource_id {
                return Err(StorageError::ResourceMismatch {
                    thread_id: thread.id,
                    requested: resource_id.clone(),
                    actual: thread.resource_id,
                });
            }
        }

        let recency = request.recency.unwrap_or(self.options.default_recency);
        let resolved = MessageWindowResolver::new(self.store.as_ref())
            .resolve(&request.thread_id, recency, &request.anchors)
            .await?;

        let mut messages = resolved
            .documents
            .into_iter()
            .map(Message::decode)
            .collect::<Result<Vec<_>, _>>()?;
        messages.sort_by_key(|message| message.sequence);
        debug!(
            "read message window (thread_id={}, messages={}, missing_anchors={})",
            request.thread_id,
            messages.len(),
            resolved.missing_anchors.len()
        );
        Ok(MessageWindow {
            messages,
            missing_anchors: resolved.missing_anchors,
        })
    }
}

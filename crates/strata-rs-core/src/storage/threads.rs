//! Thread operations.

use super::AgentStorage;
use crate::codec::Transcode;
use crate::codec::time::{from_millis, to_millis};
use crate::error::{StorageError, TranscodeError};
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info};
use serde_json::{Map, Value};
use strata_rs_protocol::{Thread, ThreadUpdate};
use strata_rs_store::{
    Cursor, Document, DocumentPatch, IndexQuery, ScanSource, StoredDocument, ThreadPatch,
    UniqueKey,
};

/// Fields for a thread that does not exist yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadDraft {
    /// Generated when absent.
    pub id: Option<String>,
    pub resource_id: String,
    /// Defaults to `New Thread <timestamp>`.
    pub title: Option<String>,
    pub metadata: Option<Map<String, Value>>,
}

impl ThreadDraft {
    pub fn new(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            ..Self::default()
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Current time truncated to what the store can keep.
pub(crate) fn now() -> Result<DateTime<Utc>, StorageError> {
    Ok(from_millis(to_millis(Utc::now()))?)
}

fn default_title(at: DateTime<Utc>) -> String {
    format!("New Thread {}", at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

impl AgentStorage {
    /// Create and store a new thread.
    pub async fn create_thread(&self, draft: ThreadDraft) -> Result<Thread, StorageError> {
        let now = now()?;
        let thread = Thread {
            id: draft
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            resource_id: draft.resource_id,
            title: Some(draft.title.unwrap_or_else(|| default_title(now))),
            metadata: draft.metadata,
            created_at: now,
            updated_at: now,
        };
        self.save_thread(&thread).await?;
        Ok(thread)
    }

    /// Store `thread`, replacing any thread with the same id.
    pub async fn save_thread(&self, thread: &Thread) -> Result<(), StorageError> {
        let document = Document::Thread(thread.encode()?);
        match self.find_thread(&thread.id).await? {
            Some(existing) => {
                self.store.replace(existing.doc_id, document).await?;
                debug!("replaced thread (thread_id={})", thread.id);
            }
            None => {
                self.store.insert_one(document).await?;
                info!(
                    "created thread (thread_id={}, resource_id={})",
                    thread.id, thread.resource_id
                );
            }
        }
        Ok(())
    }

    pub async fn get_thread_by_id(&self, thread_id: &str) -> Result<Option<Thread>, StorageError> {
        match self.find_thread(thread_id).await? {
            Some(stored) => Ok(Some(Thread::from_document(stored.document)?)),
            None => Ok(None),
        }
    }

    /// Every thread owned by `resource_id`, walking the index page by page.
    pub async fn get_threads_by_resource_id(
        &self,
        resource_id: &str,
    ) -> Result<Vec<Thread>, StorageError> {
        let source = ScanSource::Index(IndexQuery::ThreadsByResource {
            resource_id: resource_id.to_string(),
        });
        let mut threads = Vec::new();
        let mut cursor: Option<Cursor> = None;
        loop {
            let page = self
                .store
                .paginate(
                    source.clone(),
                    cursor.as_ref(),
                    self.options.thread_page_size,
                )
                .await?;
            for stored in page.items {
                threads.push(Thread::from_document(stored.document)?);
            }
            if page.is_done {
                break;
            }
            cursor = Some(page.continue_cursor);
        }
        Ok(threads)
    }

    /// Apply `update` and refresh `updatedAt`.
    ///
    /// Title and metadata are independent; metadata is replaced as a whole.
    pub async fn update_thread(
        &self,
        thread_id: &str,
        update: ThreadUpdate,
    ) -> Result<Thread, StorageError> {
        let stored = self
            .find_thread(thread_id)
            .await?
            .ok_or_else(|| StorageError::ThreadNotFound(thread_id.to_string()))?;
        let mut thread = Thread::from_document(stored.document)?;

        let updated_at = now()?;
        let metadata = update
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|source| TranscodeError::Json {
                field: "metadata",
                source,
            })?;
        self.store
            .patch(
                stored.doc_id,
                DocumentPatch::Thread(ThreadPatch {
                    title: update.title.clone(),
                    metadata,
                    updated_at: to_millis(updated_at),
                }),
            )
            .await?;
        info!("updated thread (thread_id={})", thread_id);

        if let Some(title) = update.title {
            thread.title = Some(title);
        }
        if let Some(metadata) = update.metadata {
            thread.metadata = Some(metadata);
        }
        thread.updated_at = updated_at;
        Ok(thread)
    }

    /// Remove a thread. Its messages stay in the store.
    pub async fn delete_thread(&self, thread_id: &str) -> Result<(), StorageError> {
        let stored = self
            .find_thread(thread_id)
            .await?
            .ok_or_else(|| StorageError::ThreadNotFound(thread_id.to_string()))?;
        self.store.delete(stored.doc_id).await?;
        info!("deleted thread (thread_id={})", thread_id);
        Ok(())
    }

    pub(crate) async fn find_thread(
        &self,
        thread_id: &str,
    ) -> Result<Option<StoredDocument>, StorageError> {
        Ok(self
            .store
            .get_by_key(&UniqueKey::Thread(thread_id.to_string()))
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::default_title;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    #[test]
    fn default_title_uses_millisecond_rfc3339() {
        let at = Utc
            .timestamp_millis_opt(1_700_000_000_123)
            .single()
            .expect("ts");
        assert_eq!(default_title(at), "New Thread 2023-11-14T22:13:20.123Z");
    }
}

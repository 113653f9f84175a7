//! Workflow snapshots, last write wins per (workflow, run).

use super::AgentStorage;
use super::threads::now;
use crate::codec::Transcode;
use crate::codec::time::to_millis;
use crate::error::{StorageError, TranscodeError};
use log::{debug, info};
use serde_json::Value;
use strata_rs_protocol::WorkflowSnapshot;
use strata_rs_store::{Document, DocumentPatch, SnapshotPatch, UniqueKey};

fn snapshot_key(workflow_name: &str, run_id: &str) -> UniqueKey {
    UniqueKey::Snapshot {
        workflow_name: workflow_name.to_string(),
        run_id: run_id.to_string(),
    }
}

impl AgentStorage {
    /// Store `snapshot` for a run, overwriting the previous one.
    ///
    /// An overwrite keeps the original `createdAt`.
    pub async fn persist_workflow_snapshot(
        &self,
        workflow_name: &str,
        run_id: &str,
        snapshot: Value,
    ) -> Result<WorkflowSnapshot, StorageError> {
        let now = now()?;
        let existing = self
            .store
            .get_by_key(&snapshot_key(workflow_name, run_id))
            .await?;
        match existing {
            Some(stored) => {
                let mut current = WorkflowSnapshot::from_document(stored.document)?;
                let text = serde_json::to_string(&snapshot).map_err(|source| {
                    TranscodeError::Json {
                        field: "snapshot",
                        source,
                    }
                })?;
                self.store
                    .patch(
                        stored.doc_id,
                        DocumentPatch::Snapshot(SnapshotPatch {
                            snapshot: text,
                            updated_at: to_millis(now),
                        }),
                    )
                    .await?;
                debug!(
                    "overwrote workflow snapshot (workflow={}, run_id={})",
                    workflow_name, run_id
                );
                current.snapshot = snapshot;
                current.updated_at = now;
                Ok(current)
            }
            None => {
                let created = WorkflowSnapshot {
                    workflow_name: workflow_name.to_string(),
                    run_id: run_id.to_string(),
                    snapshot,
                    created_at: now,
                    updated_at: now,
                };
                self.store
                    .insert_one(Document::Snapshot(created.encode()?))
                    .await?;
                info!(
                    "stored workflow snapshot (workflow={}, run_id={})",
                    workflow_name, run_id
                );
                Ok(created)
            }
        }
    }

    pub async fn load_workflow_snapshot(
        &self,
        workflow_name: &str,
        run_id: &str,
    ) -> Result<Option<WorkflowSnapshot>, StorageError> {
        match self
            .store
            .get_by_key(&snapshot_key(workflow_name, run_id))
            .await?
        {
            Some(stored) => Ok(Some(WorkflowSnapshot::from_document(stored.document)?)),
            None => Ok(None),
        }
    }
}

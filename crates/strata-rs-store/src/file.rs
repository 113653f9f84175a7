//! JSONL-persisted row store.

use crate::document::{DocId, Document, MessageDocument, NewMessageDocument, StoredDocument};
use crate::error::StoreError;
use crate::memory::{StoreCounters, Tables};
use crate::store::{
    Cursor, DocumentPatch, IndexQuery, Order, Page, RowStore, ScanSource, UniqueKey,
};
use async_trait::async_trait;
use log::{debug, info};
use parking_lot::RwLock;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use strata_rs_protocol::TableKind;

const COUNTERS_FILE: &str = "counters.json";

/// Row store that keeps every table in memory and mirrors each table to
/// `<root>/<store table>.jsonl`.
///
/// A table file is rewritten through a temporary file and a rename after
/// every mutation that touches it, so readers never observe a partial file.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    tables: RwLock<Tables>,
}

impl FileStore {
    /// Open (or create) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;

        let mut documents = Vec::new();
        for table in TableKind::ALL {
            documents.extend(read_table(&table_path(&root, table))?);
        }
        let counters_path = root.join(COUNTERS_FILE);
        let counters = if counters_path.exists() {
            let raw = std::fs::read_to_string(&counters_path)?;
            serde_json::from_str(&raw)?
        } else {
            StoreCounters::default()
        };
        let count = documents.len();
        let tables = Tables::restore(documents, counters)?;
        info!(
            "opened file store (root={}, documents={})",
            root.display(),
            count
        );
        Ok(Self {
            root,
            tables: RwLock::new(tables),
        })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Apply `mutate` to a staged copy of the tables, write the touched
    /// table, and only then publish the copy. A failed write leaves both
    /// memory and disk as they were.
    fn commit<T>(
        &self,
        mutate: impl FnOnce(&mut Tables) -> Result<(T, TableKind), StoreError>,
    ) -> Result<T, StoreError> {
        let mut tables = self.tables.write();
        let mut staged = tables.clone();
        let (value, table) = mutate(&mut staged)?;
        self.persist(&staged, table)?;
        *tables = staged;
        Ok(value)
    }

    fn persist(&self, tables: &Tables, table: TableKind) -> Result<(), StoreError> {
        let documents = tables.dump(table);
        write_atomic(&table_path(&self.root, table), |file| {
            for document in &documents {
                let line = serde_json::to_string(document)?;
                writeln!(file, "{line}")?;
            }
            Ok(())
        })?;
        let counters = serde_json::to_string_pretty(tables.counters())?;
        write_atomic(&self.root.join(COUNTERS_FILE), |file| {
            file.write_all(counters.as_bytes())?;
            Ok(())
        })?;
        debug!(
            "persisted table (table={}, documents={})",
            table,
            documents.len()
        );
        Ok(())
    }
}

fn table_path(root: &Path, table: TableKind) -> PathBuf {
    root.join(format!("{}.jsonl", table.store_name()))
}

fn read_table(path: &Path) -> Result<Vec<StoredDocument>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = OpenOptions::new().read(true).open(path)?;
    let reader = BufReader::new(file);
    let mut documents = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        documents.push(serde_json::from_str(&line)?);
    }
    Ok(documents)
}

fn write_atomic(
    path: &Path,
    write: impl FnOnce(&mut std::fs::File) -> Result<(), StoreError>,
) -> Result<(), StoreError> {
    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");
    let temp_path = PathBuf::from(temp_path);
    {
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&temp_path)?;
        write(&mut file)?;
        file.flush()?;
    }
    std::fs::rename(temp_path, path)?;
    Ok(())
}

#[async_trait]
impl RowStore for FileStore {
    async fn insert_one(&self, document: Document) -> Result<DocId, StoreError> {
        let table = document.table();
        self.commit(|tables| Ok((tables.insert_one(document)?, table)))
    }

    async fn insert_many(
        &self,
        table: TableKind,
        documents: Vec<Document>,
    ) -> Result<Vec<DocId>, StoreError> {
        self.commit(|tables| Ok((tables.insert_many(table, documents)?, table)))
    }

    async fn get_by_key(&self, key: &UniqueKey) -> Result<Option<StoredDocument>, StoreError> {
        Ok(self.tables.read().get_by_key(key))
    }

    async fn scan(
        &self,
        query: IndexQuery,
        order: Order,
        limit: Option<usize>,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        Ok(self.tables.read().scan(&query, order, limit))
    }

    async fn range_scan(
        &self,
        thread_id: &str,
        low: u64,
        high: u64,
    ) -> Result<Vec<MessageDocument>, StoreError> {
        Ok(self.tables.read().range_scan(thread_id, low, high))
    }

    async fn append_messages(
        &self,
        messages: Vec<NewMessageDocument>,
    ) -> Result<Vec<MessageDocument>, StoreError> {
        self.commit(|tables| Ok((tables.append_messages(messages)?, TableKind::Messages)))
    }

    async fn paginate(
        &self,
        source: ScanSource,
        cursor: Option<&Cursor>,
        page_size: usize,
    ) -> Result<Page<StoredDocument>, StoreError> {
        self.tables.read().paginate(&source, cursor, page_size)
    }

    async fn patch(&self, doc_id: DocId, patch: DocumentPatch) -> Result<(), StoreError> {
        self.commit(|tables| {
            let table = tables.table_of(doc_id)?;
            tables.patch(doc_id, patch)?;
            Ok(((), table))
        })
    }

    async fn replace(&self, doc_id: DocId, document: Document) -> Result<(), StoreError> {
        self.commit(|tables| {
            let table = tables.table_of(doc_id)?;
            tables.replace(doc_id, document)?;
            Ok(((), table))
        })
    }

    async fn delete(&self, doc_id: DocId) -> Result<(), StoreError> {
        self.commit(|tables| {
            let document = tables.delete(doc_id)?;
            Ok(((), document.table()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::FileStore;
    use crate::document::{Document, NewMessageDocument, SnapshotDocument, ThreadDocument};
    use crate::error::StoreError;
    use crate::store::{RowStore, UniqueKey};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::tempdir;

    fn message(id: &str) -> NewMessageDocument {
        NewMessageDocument {
            id: id.to_string(),
            thread_id: "t1".to_string(),
            role: "assistant".to_string(),
            kind: "text".to_string(),
            content: json!("hello"),
            created_at: 1_700_000_000_000,
        }
    }

    fn thread(id: &str) -> Document {
        Document::Thread(ThreadDocument {
            id: id.to_string(),
            resource_id: "user-1".to_string(),
            title: None,
            metadata: None,
            created_at: 1,
            updated_at: 1,
        })
    }

    #[tokio::test]
    async fn reopen_restores_documents_and_orders() {
        let temp = tempdir().expect("tempdir");
        {
            let store = FileStore::open(temp.path()).expect("open");
            store
                .append_messages(vec![message("m1"), message("m2"), message("m3")])
                .await
                .expect("append");
            let last = store
                .get_by_key(&UniqueKey::Message("m3".to_string()))
                .await
                .expect("get")
                .expect("present");
            store.delete(last.doc_id).await.expect("delete");
        }

        let reopened = FileStore::open(temp.path()).expect("reopen");
        let orders: Vec<u64> = reopened
            .range_scan("t1", 1, 10)
            .await
            .expect("scan")
            .iter()
            .map(|doc| doc.thread_order)
            .collect();
        assert_eq!(orders, vec![1, 2]);

        let appended = reopened
            .append_messages(vec![message("m4")])
            .await
            .expect("append");
        assert_eq!(appended[0].thread_order, 4);
    }

    #[tokio::test]
    async fn tables_are_written_under_store_names() {
        let temp = tempdir().expect("tempdir");
        let store = FileStore::open(temp.path()).expect("open");
        store
            .insert_one(Document::Snapshot(SnapshotDocument {
                workflow_name: "wf".to_string(),
                run_id: "run-1".to_string(),
                snapshot: "{\"step\":1}".to_string(),
                created_at: 1,
                updated_at: 1,
            }))
            .await
            .expect("insert");
        let raw = std::fs::read_to_string(temp.path().join("snapshots.jsonl")).expect("read");
        assert_eq!(raw.lines().count(), 1);
        assert!(raw.contains("\"table\":\"snapshot\""));
        assert!(!temp.path().join("snapshots.jsonl.tmp").exists());
    }

    #[tokio::test]
    async fn failed_write_leaves_no_trace() {
        let temp = tempdir().expect("tempdir");
        let store = FileStore::open(temp.path()).expect("open");
        let blocker = temp.path().join("threads.jsonl");
        std::fs::create_dir(&blocker).expect("block table file");

        let err = store.insert_one(thread("t1")).await.expect_err("write fails");
        assert!(matches!(err, StoreError::Io(_)));
        let key = UniqueKey::Thread("t1".to_string());
        assert!(store.get_by_key(&key).await.expect("get").is_none());

        std::fs::remove_dir(&blocker).expect("unblock");
        store.insert_one(thread("t1")).await.expect("retry");
        assert!(store.get_by_key(&key).await.expect("get").is_some());

        let reopened = FileStore::open(temp.path()).expect("reopen");
        assert!(reopened.get_by_key(&key).await.expect("get").is_some());
    }

    #[tokio::test]
    async fn failed_append_keeps_sequences() {
        let temp = tempdir().expect("tempdir");
        let store = FileStore::open(temp.path()).expect("open");
        store
            .append_messages(vec![message("m1")])
            .await
            .expect("append");
        let blocker = temp.path().join("messages.jsonl.tmp");
        std::fs::create_dir(&blocker).expect("block temp file");

        store
            .append_messages(vec![message("m2")])
            .await
            .expect_err("write fails");
        assert!(
            store
                .get_by_key(&UniqueKey::Message("m2".to_string()))
                .await
                .expect("get")
                .is_none()
        );

        std::fs::remove_dir(&blocker).expect("unblock");
        let appended = store
            .append_messages(vec![message("m2")])
            .await
            .expect("retry");
        assert_eq!(appended[0].thread_order, 2);
    }

    #[tokio::test]
    async fn reopened_doc_ids_do_not_collide() {
        let temp = tempdir().expect("tempdir");
        let first_id = {
            let store = FileStore::open(temp.path()).expect("open");
            store
                .insert_one(Document::Snapshot(SnapshotDocument {
                    workflow_name: "wf".to_string(),
                    run_id: "a".to_string(),
                    snapshot: "null".to_string(),
                    created_at: 1,
                    updated_at: 1,
                }))
                .await
                .expect("insert")
        };
        let store = FileStore::open(temp.path()).expect("reopen");
        let second_id = store
            .insert_one(Document::Snapshot(SnapshotDocument {
                workflow_name: "wf".to_string(),
                run_id: "b".to_string(),
                snapshot: "null".to_string(),
                created_at: 2,
                updated_at: 2,
            }))
            .await
            .expect("insert");
        assert!(second_id > first_id);
    }
}

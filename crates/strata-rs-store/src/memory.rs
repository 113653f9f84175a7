//! In-process row store.

use crate::document::{DocId, Document, MessageDocument, NewMessageDocument, StoredDocument};
use crate::error::StoreError;
use crate::store::{
    Cursor, DocumentPatch, IndexQuery, Order, Page, RowStore, ScanSource, UniqueKey,
};
use async_trait::async_trait;
use log::debug;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use strata_rs_protocol::TableKind;

/// Id and sequence counters that must survive document deletion.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub(crate) struct StoreCounters {
    /// Highest document id handed out so far.
    pub next_doc_id: u64,
    /// Highest thread order assigned per thread.
    pub thread_orders: BTreeMap<String, u64>,
}

/// Per-table collections plus the indexes the store maintains over them.
#[derive(Debug, Clone, Default)]
pub(crate) struct Tables {
    documents: BTreeMap<TableKind, BTreeMap<DocId, Document>>,
    locations: HashMap<DocId, TableKind>,
    keys: HashMap<UniqueKey, DocId>,
    message_order: BTreeMap<(String, u64), DocId>,
    counters: StoreCounters,
}

impl Tables {
    pub(crate) fn counters(&self) -> &StoreCounters {
        &self.counters
    }

    /// Rebuild state from persisted documents and counters.
    pub(crate) fn restore(
        documents: Vec<StoredDocument>,
        counters: StoreCounters,
    ) -> Result<Self, StoreError> {
        let mut tables = Tables {
            counters,
            ..Tables::default()
        };
        for stored in documents {
            if tables.locations.contains_key(&stored.doc_id) {
                return Err(StoreError::Fault(format!(
                    "document id {} appears twice",
                    stored.doc_id
                )));
            }
            if let Some(key) = stored.document.unique_key() {
                tables.ensure_key_free(&key)?;
            }
            tables.counters.next_doc_id = tables.counters.next_doc_id.max(stored.doc_id.0);
            tables.place(stored.doc_id, stored.document);
        }
        Ok(tables)
    }

    /// Every document of `table`, ordered by id.
    pub(crate) fn dump(&self, table: TableKind) -> Vec<StoredDocument> {
        self.documents
            .get(&table)
            .map(|documents| {
                documents
                    .iter()
                    .map(|(doc_id, document)| StoredDocument {
                        doc_id: *doc_id,
                        document: document.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn len(&self, table: TableKind) -> usize {
        self.documents.get(&table).map_or(0, BTreeMap::len)
    }

    /// Table holding `doc_id`.
    pub(crate) fn table_of(&self, doc_id: DocId) -> Result<TableKind, StoreError> {
        self.locations
            .get(&doc_id)
            .copied()
            .ok_or(StoreError::DocumentNotFound(doc_id))
    }

    fn allocate(&mut self) -> DocId {
        self.counters.next_doc_id += 1;
        DocId(self.counters.next_doc_id)
    }

    fn ensure_key_free(&self, key: &UniqueKey) -> Result<(), StoreError> {
        if self.keys.contains_key(key) {
            return Err(StoreError::DuplicateKey {
                table: key.table(),
                key: key.to_string(),
            });
        }
        Ok(())
    }

    fn place(&mut self, doc_id: DocId, document: Document) {
        let table = document.table();
        if let Some(key) = document.unique_key() {
            self.keys.insert(key, doc_id);
        }
        if let Document::Message(message) = &document {
            self.message_order
                .insert((message.thread_id.clone(), message.thread_order), doc_id);
            let highest = self
                .counters
                .thread_orders
                .entry(message.thread_id.clone())
                .or_insert(0);
            *highest = (*highest).max(message.thread_order);
        }
        self.locations.insert(doc_id, table);
        self.documents
            .entry(table)
            .or_default()
            .insert(doc_id, document);
    }

    fn unindex(&mut self, document: &Document) {
        if let Some(key) = document.unique_key() {
            self.keys.remove(&key);
        }
        if let Document::Message(message) = document {
            self.message_order
                .remove(&(message.thread_id.clone(), message.thread_order));
        }
    }

    fn check_batch_keys(&self, documents: &[Document]) -> Result<(), StoreError> {
        let mut seen = HashSet::new();
        for key in documents.iter().filter_map(Document::unique_key) {
            self.ensure_key_free(&key)?;
            if !seen.insert(key.clone()) {
                return Err(StoreError::DuplicateKey {
                    table: key.table(),
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn insert_one(&mut self, document: Document) -> Result<DocId, StoreError> {
        if document.table() == TableKind::Messages {
            return Err(StoreError::Unsupported {
                table: TableKind::Messages,
                operation: "insert_one",
            });
        }
        if let Some(key) = document.unique_key() {
            self.ensure_key_free(&key)?;
        }
        let doc_id = self.allocate();
        self.place(doc_id, document);
        Ok(doc_id)
    }

    pub(crate) fn insert_many(
        &mut self,
        table: TableKind,
        documents: Vec<Document>,
    ) -> Result<Vec<DocId>, StoreError> {
        if table == TableKind::Messages {
            return Err(StoreError::Unsupported {
                table,
                operation: "insert_many",
            });
        }
        if let Some(found) = documents
            .iter()
            .map(Document::table)
            .find(|found| *found != table)
        {
            return Err(StoreError::TableMismatch {
                expected: table,
                found,
            });
        }
        self.check_batch_keys(&documents)?;
        let mut ids = Vec::with_capacity(documents.len());
        for document in documents {
            let doc_id = self.allocate();
            self.place(doc_id, document);
            ids.push(doc_id);
        }
        Ok(ids)
    }

    pub(crate) fn append_messages(
        &mut self,
        messages: Vec<NewMessageDocument>,
    ) -> Result<Vec<MessageDocument>, StoreError> {
        let mut seen = HashSet::new();
        for message in &messages {
            let key = UniqueKey::Message(message.id.clone());
            self.ensure_key_free(&key)?;
            if !seen.insert(message.id.as_str()) {
                return Err(StoreError::DuplicateKey {
                    table: TableKind::Messages,
                    key: message.id.clone(),
                });
            }
        }

        let mut appended = Vec::with_capacity(messages.len());
        for message in messages {
            let next = self
                .counters
                .thread_orders
                .get(&message.thread_id)
                .copied()
                .unwrap_or(0)
                + 1;
            let document = message.with_order(next);
            let doc_id = self.allocate();
            self.place(doc_id, Document::Message(document.clone()));
            appended.push(document);
        }
        Ok(appended)
    }

    pub(crate) fn get_by_key(&self, key: &UniqueKey) -> Option<StoredDocument> {
        let doc_id = *self.keys.get(key)?;
        self.get(doc_id)
    }

    fn get(&self, doc_id: DocId) -> Option<StoredDocument> {
        let table = self.locations.get(&doc_id)?;
        let document = self.documents.get(table)?.get(&doc_id)?;
        Some(StoredDocument {
            doc_id,
            document: document.clone(),
        })
    }

    fn matches_index(query: &IndexQuery, document: &Document) -> bool {
        match (query, document) {
            (IndexQuery::MessagesByThread { thread_id }, Document::Message(doc)) => {
                doc.thread_id == *thread_id
            }
            (IndexQuery::ThreadsByResource { resource_id }, Document::Thread(doc)) => {
                doc.resource_id == *resource_id
            }
            (IndexQuery::EvalsByAgent { agent_name }, Document::Eval(doc)) => {
                doc.agent_name == *agent_name
            }
            _ => false,
        }
    }

    pub(crate) fn scan(
        &self,
        query: &IndexQuery,
        order: Order,
        limit: Option<usize>,
    ) -> Vec<StoredDocument> {
        let limit = limit.unwrap_or(usize::MAX);
        let ids: Vec<DocId> = match query {
            IndexQuery::MessagesByThread { thread_id } => {
                let range = self
                    .message_order
                    .range((thread_id.clone(), 0)..=(thread_id.clone(), u64::MAX))
                    .map(|(_, doc_id)| *doc_id);
                match order {
                    Order::Asc => range.take(limit).collect(),
                    Order::Desc => range.rev().take(limit).collect(),
                }
            }
            _ => {
                let matching = self
                    .documents
                    .get(&query.table())
                    .into_iter()
                    .flat_map(|documents| documents.iter())
                    .filter(|(_, document)| Self::matches_index(query, document))
                    .map(|(doc_id, _)| *doc_id);
                match order {
                    Order::Asc => matching.take(limit).collect(),
                    Order::Desc => {
                        let mut all: Vec<DocId> = matching.collect();
                        all.reverse();
                        all.truncate(limit);
                        all
                    }
                }
            }
        };
        ids.into_iter().filter_map(|doc_id| self.get(doc_id)).collect()
    }

    pub(crate) fn range_scan(&self, thread_id: &str, low: u64, high: u64) -> Vec<MessageDocument> {
        if low > high {
            return Vec::new();
        }
        self.message_order
            .range((thread_id.to_string(), low)..=(thread_id.to_string(), high))
            .filter_map(|(_, doc_id)| self.get(*doc_id))
            .filter_map(StoredDocument::into_message)
            .collect()
    }

    pub(crate) fn paginate(
        &self,
        source: &ScanSource,
        cursor: Option<&Cursor>,
        page_size: usize,
    ) -> Result<Page<StoredDocument>, StoreError> {
        if page_size == 0 {
            return Err(StoreError::Fault("page size must be positive".to_string()));
        }
        let after = match cursor {
            Some(cursor) => cursor.position()?,
            None => None,
        };
        let mut remaining = self
            .documents
            .get(&source.table())
            .into_iter()
            .flat_map(|documents| documents.iter())
            .filter(|(doc_id, _)| after.is_none_or(|last| **doc_id > last))
            .filter(|(_, document)| match source {
                ScanSource::Table(_) => true,
                ScanSource::Index(query) => Self::matches_index(query, document),
            });

        let items: Vec<StoredDocument> = remaining
            .by_ref()
            .take(page_size)
            .map(|(doc_id, document)| StoredDocument {
                doc_id: *doc_id,
                document: document.clone(),
            })
            .collect();
        let is_done = remaining.next().is_none();
        let continue_cursor = match items.last() {
            Some(last) => Cursor::after(last.doc_id),
            None => cursor.cloned().unwrap_or_default(),
        };
        Ok(Page {
            items,
            continue_cursor,
            is_done,
        })
    }

    pub(crate) fn patch(&mut self, doc_id: DocId, patch: DocumentPatch) -> Result<(), StoreError> {
        let table = self.table_of(doc_id)?;
        if table != patch.table() {
            return Err(StoreError::TableMismatch {
                expected: table,
                found: patch.table(),
            });
        }
        let document = self
            .documents
            .get_mut(&table)
            .and_then(|documents| documents.get_mut(&doc_id))
            .ok_or(StoreError::DocumentNotFound(doc_id))?;
        match (document, patch) {
            (Document::Thread(thread), DocumentPatch::Thread(patch)) => {
                if let Some(title) = patch.title {
                    thread.title = Some(title);
                }
                if let Some(metadata) = patch.metadata {
                    thread.metadata = Some(metadata);
                }
                thread.updated_at = patch.updated_at;
            }
            (Document::Snapshot(snapshot), DocumentPatch::Snapshot(patch)) => {
                snapshot.snapshot = patch.snapshot;
                snapshot.updated_at = patch.updated_at;
            }
            (document, patch) => {
                return Err(StoreError::TableMismatch {
                    expected: document.table(),
                    found: patch.table(),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn replace(&mut self, doc_id: DocId, document: Document) -> Result<(), StoreError> {
        let table = self.table_of(doc_id)?;
        if table != document.table() {
            return Err(StoreError::TableMismatch {
                expected: table,
                found: document.table(),
            });
        }
        if table == TableKind::Messages {
            return Err(StoreError::Unsupported {
                table,
                operation: "replace",
            });
        }
        if let Some(key) = document.unique_key() {
            if self.keys.get(&key).is_some_and(|owner| *owner != doc_id) {
                return Err(StoreError::DuplicateKey {
                    table,
                    key: key.to_string(),
                });
            }
        }
        if let Some(previous) = self
            .documents
            .get_mut(&table)
            .and_then(|documents| documents.remove(&doc_id))
        {
            self.unindex(&previous);
        }
        self.place(doc_id, document);
        Ok(())
    }

    pub(crate) fn delete(&mut self, doc_id: DocId) -> Result<Document, StoreError> {
        let table = self.table_of(doc_id)?;
        let document = self
            .documents
            .get_mut(&table)
            .and_then(|documents| documents.remove(&doc_id))
            .ok_or(StoreError::DocumentNotFound(doc_id))?;
        self.locations.remove(&doc_id);
        self.unindex(&document);
        Ok(document)
    }
}

/// Row store holding every table in process memory.
///
/// Each instance owns its own tables; nothing is shared between instances.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently held in `table`.
    pub fn len(&self, table: TableKind) -> usize {
        self.tables.read().len(table)
    }

    pub fn is_empty(&self, table: TableKind) -> bool {
        self.len(table) == 0
    }
}

#[async_trait]
impl RowStore for InMemoryStore {
    async fn insert_one(&self, document: Document) -> Result<DocId, StoreError> {
        let table = document.table();
        let doc_id = self.tables.write().insert_one(document)?;
        debug!("inserted document (table={}, doc_id={})", table, doc_id);
        Ok(doc_id)
    }

    async fn insert_many(
        &self,
        table: TableKind,
        documents: Vec<Document>,
    ) -> Result<Vec<DocId>, StoreError> {
        let ids = self.tables.write().insert_many(table, documents)?;
        debug!("inserted documents (table={}, count={})", table, ids.len());
        Ok(ids)
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
        let appended = self.tables.write().append_messages(messages)?;
        debug!("appended messages (count={})", appended.len());
        Ok(appended)
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
        self.tables.write().patch(doc_id, patch)?;
        debug!("patched document (doc_id={})", doc_id);
        Ok(())
    }

    async fn replace(&self, doc_id: DocId, document: Document) -> Result<(), StoreError> {
        self.tables.write().replace(doc_id, document)?;
        debug!("replaced document (doc_id={})", doc_id);
        Ok(())
    }

    async fn delete(&self, doc_id: DocId) -> Result<(), StoreError> {
        let document = self.tables.write().delete(doc_id)?;
        debug!(
            "deleted document (table={}, doc_id={})",
            document.table(),
            doc_id
        );
        Ok(())
    }
}

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use strata_rs_protocol::TableKind;
use strata_rs_store::{
    Cursor, DocId, Document, DocumentPatch, IndexQuery, MessageDocument, NewMessageDocument, Order,
    Page, RowStore, ScanSource, StoreError, StoredDocument, UniqueKey,
};

/// Wraps a store and fails the operations it is told to fail.
///
/// Operations are named after the `RowStore` methods, e.g. `"range_scan"`.
pub struct FaultyStore<S> {
    inner: S,
    failing: Mutex<BTreeSet<&'static str>>,
}

impl<S: RowStore> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failing: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn fail_on(&self, operation: &'static str) {
        self.failing.lock().insert(operation);
    }

    pub fn heal(&self) {
        self.failing.lock().clear();
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn check(&self, operation: &'static str) -> Result<(), StoreError> {
        if self.failing.lock().contains(operation) {
            return Err(StoreError::Fault(format!("injected fault in {operation}")));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: RowStore> RowStore for FaultyStore<S> {
    async fn insert_one(&self, document: Document) -> Result<DocId, StoreError> {
        self.check("insert_one")?;
        self.inner.insert_one(document).await
    }

    async fn insert_many(
        &self,
        table: TableKind,
        documents: Vec<Document>,
    ) -> Result<Vec<DocId>, StoreError> {
        self.check("insert_many")?;
        self.inner.insert_many(table, documents).await
    }

    async fn get_by_key(&self, key: &UniqueKey) -> Result<Option<StoredDocument>, StoreError> {
        self.check("get_by_key")?;
        self.inner.get_by_key(key).await
    }

    async fn scan(
        &self,
        query: IndexQuery,
        order: Order,
        limit: Option<usize>,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        self.check("scan")?;
        self.inner.scan(query, order, limit).await
    }

    async fn range_scan(
        &self,
        thread_id: &str,
        low: u64,
        high: u64,
    ) -> Result<Vec<MessageDocument>, StoreError> {
        self.check("range_scan")?;
        self.inner.range_scan(thread_id, low, high).await
    }

    async fn append_messages(
        &self,
        messages: Vec<NewMessageDocument>,
    ) -> Result<Vec<MessageDocument>, StoreError> {
        self.check("append_messages")?;
        self.inner.append_messages(messages).await
    }

    async fn paginate(
        &self,
        source: ScanSource,
        cursor: Option<&Cursor>,
        page_size: usize,
    ) -> Result<Page<StoredDocument>, StoreError> {
        self.check("paginate")?;
        self.inner.paginate(source, cursor, page_size).await
    }

    async fn patch(&self, doc_id: DocId, patch: DocumentPatch) -> Result<(), StoreError> {
        self.check("patch")?;
        self.inner.patch(doc_id, patch).await
    }

    async fn replace(&self, doc_id: DocId, document: Document) -> Result<(), StoreError> {
        self.check("replace")?;
        self.inner.replace(doc_id, document).await
    }

    async fn delete(&self, doc_id: DocId) -> Result<(), StoreError> {
        self.check("delete")?;
        self.inner.delete(doc_id).await
    }
}

use async_trait::async_trait;
use parking_lot::Mutex;
use strata_rs_protocol::TableKind;
use strata_rs_store::{
    Cursor, DocId, Document, DocumentPatch, IndexQuery, MessageDocument, NewMessageDocument, Order,
    Page, RowStore, ScanSource, StoreError, StoredDocument, UniqueKey,
};

/// One call observed by a `RecordingStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    InsertOne(TableKind),
    InsertMany(TableKind, usize),
    GetByKey(UniqueKey),
    Scan(IndexQuery, Order, Option<usize>),
    RangeScan {
        thread_id: String,
        low: u64,
        high: u64,
    },
    AppendMessages(usize),
    Paginate(ScanSource, usize),
    Patch(DocId),
    Replace(DocId),
    Delete(DocId),
}

/// Wraps a store and records every call made through it.
pub struct RecordingStore<S> {
    inner: S,
    calls: Mutex<Vec<RecordedCall>>,
}

impl<S: RowStore> RecordingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Forget everything recorded so far.
    pub fn reset(&self) {
        self.calls.lock().clear();
    }

    /// `(low, high)` of every range scan, in call order.
    pub fn range_scans(&self) -> Vec<(u64, u64)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                RecordedCall::RangeScan { low, high, .. } => Some((*low, *high)),
                _ => None,
            })
            .collect()
    }

    pub fn range_scan_count(&self) -> usize {
        self.range_scans().len()
    }

    pub fn get_by_key_count(&self) -> usize {
        self.count(|call| matches!(call, RecordedCall::GetByKey(_)))
    }

    pub fn scan_count(&self) -> usize {
        self.count(|call| matches!(call, RecordedCall::Scan(..)))
    }

    pub fn paginate_count(&self) -> usize {
        self.count(|call| matches!(call, RecordedCall::Paginate(..)))
    }

    fn count(&self, predicate: impl Fn(&RecordedCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| predicate(call)).count()
    }

    fn record(&self, call: RecordedCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl<S: RowStore> RowStore for RecordingStore<S> {
    async fn insert_one(&self, document: Document) -> Result<DocId, StoreError> {
        self.record(RecordedCall::InsertOne(document.table()));
        self.inner.insert_one(document).await
    }

    async fn insert_many(
        &self,
        table: TableKind,
        documents: Vec<Document>,
    ) -> Result<Vec<DocId>, StoreError> {
        self.record(RecordedCall::InsertMany(table, documents.len()));
        self.inner.insert_many(table, documents).await
    }

    async fn get_by_key(&self, key: &UniqueKey) -> Result<Option<StoredDocument>, StoreError> {
        self.record(RecordedCall::GetByKey(key.clone()));
        self.inner.get_by_key(key).await
    }

    async fn scan(
        &self,
        query: IndexQuery,
        order: Order,
        limit: Option<usize>,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        self.record(RecordedCall::Scan(query.clone(), order, limit));
        self.inner.scan(query, order, limit).await
    }

    async fn range_scan(
        &self,
        thread_id: &str,
        low: u64,
        high: u64,
    ) -> Result<Vec<MessageDocument>, StoreError> {
        self.record(RecordedCall::RangeScan {
            thread_id: thread_id.to_string(),
            low,
            high,
        });
        self.inner.range_scan(thread_id, low, high).await
    }

    async fn append_messages(
        &self,
        messages: Vec<NewMessageDocument>,
    ) -> Result<Vec<MessageDocument>, StoreError> {
        self.record(RecordedCall::AppendMessages(messages.len()));
        self.inner.append_messages(messages).await
    }

    async fn paginate(
        &self,
        source: ScanSource,
        cursor: Option<&Cursor>,
        page_size: usize,
    ) -> Result<Page<StoredDocument>, StoreError> {
        self.record(RecordedCall::Paginate(source.clone(), page_size));
        self.inner.paginate(source, cursor, page_size).await
    }

    async fn patch(&self, doc_id: DocId, patch: DocumentPatch) -> Result<(), StoreError> {
        self.record(RecordedCall::Patch(doc_id));
        self.inner.patch(doc_id, patch).await
    }

    async fn replace(&self, doc_id: DocId, document: Document) -> Result<(), StoreError> {
        self.record(RecordedCall::Replace(doc_id));
        self.inner.replace(doc_id, document).await
    }

    async fn delete(&self, doc_id: DocId) -> Result<(), StoreError> {
        self.record(RecordedCall::Delete(doc_id));
        self.inner.delete(doc_id).await
    }
}

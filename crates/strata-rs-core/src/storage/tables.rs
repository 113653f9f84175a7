//! Generic table operations: schema checks, bulk clear, row I/O.

use super::AgentStorage;
use crate::codec::{self, EncodedRow};
use crate::error::StorageError;
use futures_util::future::try_join_all;
use log::{debug, info};
use std::collections::BTreeMap;
use strata_rs_protocol::{ColumnSpec, LoadedRow, NewMessage, Row, RowKey, TableKind};
use strata_rs_store::{Cursor, Document, ScanSource, validate_table_schema};

impl AgentStorage {
    /// Check a framework table declaration against the stored shape.
    ///
    /// Tables always exist in the store, so this only validates.
    pub async fn create_table(
        &self,
        table: TableKind,
        columns: &BTreeMap<String, ColumnSpec>,
    ) -> Result<(), StorageError> {
        validate_table_schema(table, columns)?;
        debug!("validated table schema (table={}, columns={})", table, columns.len());
        Ok(())
    }

    /// Delete every document of `table`, returning how many were removed.
    pub async fn clear_table(&self, table: TableKind) -> Result<usize, StorageError> {
        let mut cleared = 0;
        let mut cursor: Option<Cursor> = None;
        loop {
            let page = self
                .store
                .paginate(
                    ScanSource::Table(table),
                    cursor.as_ref(),
                    self.options.clear_page_size,
                )
                .await?;
            cleared += page.items.len();
            try_join_all(page.items.iter().map(|stored| self.store.delete(stored.doc_id))).await?;
            if page.is_done {
                break;
            }
            cursor = Some(page.continue_cursor);
        }
        info!("cleared table (table={}, deleted={})", table, cleared);
        Ok(cleared)
    }

    /// Insert one row of any table.
    ///
    /// Threads and snapshots overwrite an existing row with the same key.
    /// Messages are appended and get the next sequence of their thread.
    pub async fn insert(&self, row: Row) -> Result<(), StorageError> {
        match row {
            Row::Thread(thread) => self.save_thread(&thread).await,
            Row::Message(message) => self.add_message(message).await.map(|_| ()),
            other => {
                let EncodedRow::Document(document) = codec::encode_row(&other)? else {
                    return Err(StorageError::Unsupported {
                        table: other.table(),
                        operation: "insert",
                    });
                };
                self.upsert_or_insert(document).await
            }
        }
    }

    /// Insert rows that all belong to `table` in a single store call.
    pub async fn batch_insert(&self, table: TableKind, rows: Vec<Row>) -> Result<(), StorageError> {
        if let Some(found) = rows.iter().map(Row::table).find(|found| *found != table) {
            return Err(StorageError::TableMismatch {
                expected: table,
                found,
            });
        }
        if rows.is_empty() {
            return Ok(());
        }

        if table == TableKind::Messages {
            let messages: Vec<NewMessage> = rows
                .into_iter()
                .filter_map(|row| match row {
                    Row::Message(message) => Some(message),
                    _ => None,
                })
                .collect();
            self.save_messages(messages).await?;
            return Ok(());
        }

        let mut documents = Vec::with_capacity(rows.len());
        for row in &rows {
            match codec::encode_row(row)? {
                EncodedRow::Document(document) => documents.push(document),
                EncodedRow::Message(_) => {
                    return Err(StorageError::TableMismatch {
                        expected: table,
                        found: TableKind::Messages,
                    });
                }
            }
        }
        let ids = self.store.insert_many(table, documents).await?;
        info!("inserted batch (table={}, count={})", table, ids.len());
        Ok(())
    }

    /// Load a row by its unique key.
    pub async fn load(&self, key: &RowKey) -> Result<Option<LoadedRow>, StorageError> {
        match self.store.get_by_key(&codec::unique_key(key)).await? {
            Some(stored) => Ok(Some(codec::decode_loaded(stored.document)?)),
            None => Ok(None),
        }
    }

    async fn upsert_or_insert(&self, document: Document) -> Result<(), StorageError> {
        let existing = match document.unique_key() {
            Some(key) if document.table() == TableKind::WorkflowSnapshot => {
                self.store.get_by_key(&key).await?
            }
            _ => None,
        };
        let table = document.table();
        match existing {
            Some(stored) => self.store.replace(stored.doc_id, document).await?,
            None => {
                self.store.insert_one(document).await?;
            }
        }
        debug!("inserted row (table={})", table);
        Ok(())
    }
}

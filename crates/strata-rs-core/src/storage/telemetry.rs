//! Evaluation and trace reads.

use super::AgentStorage;
use crate::codec::Transcode;
use crate::error::StorageError;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use strata_rs_protocol::{EvalRow, TableKind, TraceRow};
use strata_rs_store::{Cursor, Document, IndexQuery, Order, ScanSource, TraceDocument};

/// Which evaluations of an agent to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvalFilter {
    #[default]
    All,
    /// Only evaluations recorded by a test run.
    Test,
    /// Only evaluations without test info.
    Live,
}

impl EvalFilter {
    fn accepts(&self, eval: &EvalRow) -> bool {
        let is_test = eval.test_info.as_ref().is_some_and(|info| !info.is_null());
        match self {
            EvalFilter::All => true,
            EvalFilter::Test => is_test,
            EvalFilter::Live => !is_test,
        }
    }
}

/// Trace filter and page selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceQuery {
    /// Span name prefix.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    /// Attributes that must be present with exactly these values.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Zero-based page number.
    #[serde(default)]
    pub page: usize,
    /// Page size; must be at least 1.
    pub per_page: usize,
}

impl Default for TraceQuery {
    fn default() -> Self {
        Self {
            name: None,
            scope: None,
            attributes: BTreeMap::new(),
            page: 0,
            per_page: 100,
        }
    }
}

impl TraceQuery {
    fn matches(&self, trace: &TraceDocument) -> bool {
        if let Some(prefix) = &self.name {
            if !trace.name.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(scope) = &self.scope {
            if &trace.scope != scope {
                return false;
            }
        }
        self.attributes.iter().all(|(key, expected)| {
            match trace.attributes.as_ref().and_then(|attributes| attributes.get(key)) {
                Some(Value::String(actual)) => actual == expected,
                Some(other) => other.to_string() == *expected,
                None => false,
            }
        })
    }
}

impl AgentStorage {
    /// Evaluations recorded for `agent_name`, newest first.
    pub async fn get_evals_by_agent_name(
        &self,
        agent_name: &str,
        filter: EvalFilter,
    ) -> Result<Vec<EvalRow>, StorageError> {
        let rows = self
            .store
            .scan(
                IndexQuery::EvalsByAgent {
                    agent_name: agent_name.to_string(),
                },
                Order::Desc,
                None,
            )
            .await?;
        let mut evals = Vec::with_capacity(rows.len());
        for stored in rows {
            let eval = EvalRow::from_document(stored.document)?;
            if filter.accepts(&eval) {
                evals.push(eval);
            }
        }
        Ok(evals)
    }

    /// One page of spans matching `query`, in insertion order.
    ///
    /// Store pages are read only until the requested page is filled.
    pub async fn get_traces(&self, query: &TraceQuery) -> Result<Vec<TraceRow>, StorageError> {
        if query.per_page == 0 {
            return Err(StorageError::InvalidQuery(
                "per_page must be at least 1".to_string(),
            ));
        }
        let wanted = query.page.saturating_add(1).saturating_mul(query.per_page);
        let mut matches: Vec<TraceDocument> = Vec::new();
        let mut cursor: Option<Cursor> = None;
        let mut pages = 0usize;
        loop {
            let page = self
                .store
                .paginate(
                    ScanSource::Table(TableKind::Traces),
                    cursor.as_ref(),
                    self.options.trace_page_size,
                )
                .await?;
            pages += 1;
            for stored in page.items {
                if let Document::Trace(trace) = stored.document {
                    if query.matches(&trace) {
                        matches.push(trace);
                    }
                }
            }
            if page.is_done || matches.len() >= wanted {
                break;
            }
            cursor = Some(page.continue_cursor);
        }
        debug!(
            "read traces (pages={}, matches={}, page={}, per_page={})",
            pages,
            matches.len(),
            query.page,
            query.per_page
        );
        matches
            .into_iter()
            .skip(query.page.saturating_mul(query.per_page))
            .take(query.per_page)
            .map(|document| TraceRow::decode(document).map_err(StorageError::from))
            .collect()
    }
}

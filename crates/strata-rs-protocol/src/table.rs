//! Table kinds and the typed row unions that travel through generic table I/O.

use crate::rows::{EvalRow, Message, NewMessage, Thread, TraceRow, WorkflowSnapshot};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Closed set of logical tables.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    WorkflowSnapshot,
    Evals,
    Messages,
    Threads,
    Traces,
}

impl TableKind {
    /// Every table, in a stable order.
    pub const ALL: [TableKind; 5] = [
        TableKind::WorkflowSnapshot,
        TableKind::Evals,
        TableKind::Messages,
        TableKind::Threads,
        TableKind::Traces,
    ];

    /// Name the agent framework uses for this table.
    pub fn framework_name(&self) -> &'static str {
        match self {
            TableKind::WorkflowSnapshot => "workflow_snapshot",
            TableKind::Evals => "evals",
            TableKind::Messages => "messages",
            TableKind::Threads => "threads",
            TableKind::Traces => "traces",
        }
    }

    /// Name of the backing document-store table.
    pub fn store_name(&self) -> &'static str {
        match self {
            TableKind::WorkflowSnapshot => "snapshots",
            TableKind::Evals => "evals",
            TableKind::Messages => "messages",
            TableKind::Threads => "threads",
            TableKind::Traces => "traces",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.framework_name())
    }
}

/// Returned when a table name matches neither naming scheme.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unsupported table name: {0}")]
pub struct UnknownTableError(pub String);

impl FromStr for TableKind {
    type Err = UnknownTableError;

    /// Accepts either the framework name or the store table name.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        TableKind::ALL
            .into_iter()
            .find(|table| table.framework_name() == value || table.store_name() == value)
            .ok_or_else(|| UnknownTableError(value.to_string()))
    }
}

/// Column type as declared by the framework's table schema.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Timestamp,
    Uuid,
    Jsonb,
    Integer,
    Bigint,
}

/// Framework column declaration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    #[serde(rename = "type")]
    pub kind: ColumnType,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub nullable: bool,
}

impl ColumnSpec {
    /// Required column of the given type.
    pub fn required(kind: ColumnType) -> Self {
        Self {
            kind,
            primary_key: false,
            nullable: false,
        }
    }

    /// Nullable column of the given type.
    pub fn nullable(kind: ColumnType) -> Self {
        Self {
            kind,
            primary_key: false,
            nullable: true,
        }
    }
}

/// Any insertable framework row.
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    WorkflowSnapshot(WorkflowSnapshot),
    Eval(EvalRow),
    Message(NewMessage),
    Thread(Thread),
    Trace(TraceRow),
}

impl Row {
    /// Table this row belongs to.
    pub fn table(&self) -> TableKind {
        match self {
            Row::WorkflowSnapshot(_) => TableKind::WorkflowSnapshot,
            Row::Eval(_) => TableKind::Evals,
            Row::Message(_) => TableKind::Messages,
            Row::Thread(_) => TableKind::Threads,
            Row::Trace(_) => TableKind::Traces,
        }
    }
}

/// Unique key of a row in a keyed table. Evaluations have none.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RowKey {
    WorkflowSnapshot { workflow_name: String, run_id: String },
    Message(String),
    Thread(String),
    Trace(String),
}

impl RowKey {
    /// Table addressed by this key.
    pub fn table(&self) -> TableKind {
        match self {
            RowKey::WorkflowSnapshot { .. } => TableKind::WorkflowSnapshot,
            RowKey::Message(_) => TableKind::Messages,
            RowKey::Thread(_) => TableKind::Threads,
            RowKey::Trace(_) => TableKind::Traces,
        }
    }
}

/// Row returned by a keyed load.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedRow {
    WorkflowSnapshot(WorkflowSnapshot),
    Message(Message),
    Thread(Thread),
    Trace(TraceRow),
}

#[cfg(test)]
mod tests {
    use super::{TableKind, UnknownTableError};
    use pretty_assertions::assert_eq;

    #[test]
    fn table_names_map_both_ways() {
        for table in TableKind::ALL {
            assert_eq!(table.framework_name().parse::<TableKind>(), Ok(table));
            assert_eq!(table.store_name().parse::<TableKind>(), Ok(table));
        }
        assert_eq!(
            "snapshots".parse::<TableKind>(),
            Ok(TableKind::WorkflowSnapshot)
        );
    }

    #[test]
    fn unknown_table_name_fails() {
        assert_eq!(
            "numbers".parse::<TableKind>(),
            Err(UnknownTableError("numbers".to_string()))
        );
    }
}

//! Static document schemas and validation of framework column declarations.

use crate::error::StoreError;
use std::collections::BTreeMap;
use strata_rs_protocol::{ColumnSpec, ColumnType, TableKind};

/// Value kind of a stored document field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Int64,
    Float64,
    /// Arbitrary JSON value.
    Any,
}

impl FieldKind {
    fn accepts(&self, column: ColumnType) -> bool {
        match column {
            ColumnType::Text | ColumnType::Uuid => *self == FieldKind::String,
            ColumnType::Integer | ColumnType::Bigint | ColumnType::Timestamp => {
                matches!(self, FieldKind::Int64 | FieldKind::Float64)
            }
            ColumnType::Jsonb => matches!(self, FieldKind::Any | FieldKind::String),
        }
    }
}

/// One field of a stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub optional: bool,
}

const fn field(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        optional: false,
    }
}

const fn optional(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        optional: true,
    }
}

const SNAPSHOT_FIELDS: &[FieldSpec] = &[
    field("workflow_name", FieldKind::String),
    field("run_id", FieldKind::String),
    field("snapshot", FieldKind::String),
    field("created_at", FieldKind::Int64),
    field("updated_at", FieldKind::Int64),
];

const EVAL_FIELDS: &[FieldSpec] = &[
    field("input", FieldKind::String),
    field("output", FieldKind::String),
    field("result", FieldKind::String),
    field("agent_name", FieldKind::String),
    field("metric_name", FieldKind::String),
    field("instructions", FieldKind::String),
    optional("test_info", FieldKind::String),
    field("global_run_id", FieldKind::String),
    field("run_id", FieldKind::String),
    field("created_at", FieldKind::Int64),
];

const MESSAGE_FIELDS: &[FieldSpec] = &[
    field("id", FieldKind::String),
    field("thread_id", FieldKind::String),
    field("thread_order", FieldKind::Int64),
    field("role", FieldKind::String),
    field("type", FieldKind::String),
    field("content", FieldKind::Any),
    field("created_at", FieldKind::Int64),
];

const THREAD_FIELDS: &[FieldSpec] = &[
    field("id", FieldKind::String),
    field("resource_id", FieldKind::String),
    optional("title", FieldKind::String),
    optional("metadata", FieldKind::String),
    field("created_at", FieldKind::Int64),
    field("updated_at", FieldKind::Int64),
];

const TRACE_FIELDS: &[FieldSpec] = &[
    field("id", FieldKind::String),
    optional("parent_span_id", FieldKind::String),
    field("name", FieldKind::String),
    field("trace_id", FieldKind::String),
    field("scope", FieldKind::String),
    field("kind", FieldKind::Int64),
    optional("attributes", FieldKind::Any),
    optional("status", FieldKind::Any),
    optional("events", FieldKind::Any),
    optional("links", FieldKind::Any),
    optional("other", FieldKind::String),
    field("start_time", FieldKind::Int64),
    field("end_time", FieldKind::Int64),
    field("created_at", FieldKind::Int64),
];

/// Fields of the documents stored in `table`.
pub fn table_fields(table: TableKind) -> &'static [FieldSpec] {
    match table {
        TableKind::WorkflowSnapshot => SNAPSHOT_FIELDS,
        TableKind::Evals => EVAL_FIELDS,
        TableKind::Messages => MESSAGE_FIELDS,
        TableKind::Threads => THREAD_FIELDS,
        TableKind::Traces => TRACE_FIELDS,
    }
}

/// Check a framework column declaration against the stored document schema.
///
/// Column names may be given in snake_case or camelCase. Columns the
/// document does not carry, kind mismatches, and nullability disagreements
/// are rejected. Columns may be omitted; the store fills in what it manages.
pub fn validate_table_schema(
    table: TableKind,
    columns: &BTreeMap<String, ColumnSpec>,
) -> Result<(), StoreError> {
    let fields = table_fields(table);
    for (name, column) in columns {
        let normalized = to_snake_case(name);
        let Some(field) = fields.iter().find(|field| field.name == normalized) else {
            return Err(StoreError::SchemaMismatch {
                table,
                message: format!("unknown column {name}"),
            });
        };
        if !field.kind.accepts(column.kind) {
            return Err(StoreError::SchemaMismatch {
                table,
                message: format!(
                    "column {name} declared as {:?} but stored as {:?}",
                    column.kind, field.kind
                ),
            });
        }
        if column.nullable != field.optional {
            let expected = if field.optional { "nullable" } else { "required" };
            return Err(StoreError::SchemaMismatch {
                table,
                message: format!("column {name} must be {expected}"),
            });
        }
    }
    Ok(())
}

fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

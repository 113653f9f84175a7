//! Storage facade integration tests.

use pretty_assertions::assert_eq;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use strata_rs_core::{
    AgentStorage, EvalFilter, StorageError, StorageOptions, ThreadDraft, TraceQuery,
};
use strata_rs_protocol::{
    ColumnSpec, ColumnType, LoadedRow, NewMessage, Role, Row, RowKey, TableKind, ThreadUpdate,
};
use strata_rs_store::{InMemoryStore, StoreError};
use strata_rs_test_utils::{
    FaultyStore, RecordedCall, RecordingStore, eval_row, message_batch, thread_row, trace_row,
};

fn storage() -> AgentStorage {
    AgentStorage::new(Arc::new(InMemoryStore::new()))
}

fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn create_thread_fills_defaults() {
    let storage = storage();
    let thread = storage
        .create_thread(ThreadDraft::new("user-1"))
        .await
        .expect("create");
    assert!(!thread.id.is_empty());
    assert!(thread.title.as_deref().is_some_and(|title| title.starts_with("New Thread ")));
    assert_eq!(thread.created_at, thread.updated_at);

    let loaded = storage
        .get_thread_by_id(&thread.id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(loaded, thread);
}

#[tokio::test]
async fn save_thread_upserts_by_id() {
    let storage = storage();
    let mut thread = thread_row("t1", "user-1");
    storage.save_thread(&thread).await.expect("insert");
    thread.title = Some("renamed".to_string());
    storage.save_thread(&thread).await.expect("replace");

    let threads = storage.get_threads_by_resource_id("user-1").await.expect("list");
    assert_eq!(threads, vec![thread]);
}

#[tokio::test]
async fn threads_by_resource_walk_every_page() {
    let store = Arc::new(RecordingStore::new(InMemoryStore::new()));
    let options = StorageOptions {
        thread_page_size: 2,
        ..StorageOptions::default()
    };
    let storage = AgentStorage::with_options(store.clone(), options);
    for n in 0..5 {
        storage
            .save_thread(&thread_row(&format!("t{n}"), "user-1"))
            .await
            .expect("save");
    }
    storage
        .save_thread(&thread_row("other", "user-2"))
        .await
        .expect("save");
    store.reset();

    let ids: Vec<String> = storage
        .get_threads_by_resource_id("user-1")
        .await
        .expect("list")
        .into_iter()
        .map(|thread| thread.id)
        .collect();
    assert_eq!(ids, vec!["t0", "t1", "t2", "t3", "t4"]);
    assert_eq!(store.paginate_count(), 3);
}

#[tokio::test]
async fn update_thread_patches_fields_independently() {
    let storage = storage();
    let mut thread = thread_row("t1", "user-1");
    thread.metadata = Some(object(json!({ "pinned": true })));
    storage.save_thread(&thread).await.expect("save");

    let updated = storage
        .update_thread(
            "t1",
            ThreadUpdate {
                title: Some("Trip".to_string()),
                metadata: None,
            },
        )
        .await
        .expect("update");
    assert_eq!(updated.title.as_deref(), Some("Trip"));
    assert_eq!(updated.metadata, Some(object(json!({ "pinned": true }))));
    assert!(updated.updated_at > thread.updated_at);

    let updated = storage
        .update_thread(
            "t1",
            ThreadUpdate {
                title: None,
                metadata: Some(object(json!({ "topic": "travel" }))),
            },
        )
        .await
        .expect("update");
    let loaded = storage
        .get_thread_by_id("t1")
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(loaded, updated);
    assert_eq!(loaded.title.as_deref(), Some("Trip"));
    assert_eq!(loaded.metadata, Some(object(json!({ "topic": "travel" }))));
}

#[tokio::test]
async fn missing_thread_mutations_fail() {
    let storage = storage();
    let err = storage
        .update_thread("ghost", ThreadUpdate::default())
        .await
        .expect_err("update");
    assert!(matches!(err, StorageError::ThreadNotFound(ref id) if id == "ghost"));
    let err = storage.delete_thread("ghost").await.expect_err("delete");
    assert!(matches!(err, StorageError::ThreadNotFound(_)));
}

#[tokio::test]
async fn delete_thread_keeps_messages() {
    let storage = storage();
    let mut batch = message_batch("t1", 2);
    batch[0].resource_id = Some("user-1".to_string());
    storage.save_messages(batch).await.expect("save");

    storage.delete_thread("t1").await.expect("delete");
    assert_eq!(storage.get_thread_by_id("t1").await.expect("get"), None);
    let message = storage.get_message("t1-m2").await.expect("message kept");
    assert_eq!(message.sequence, 2);
}

#[tokio::test]
async fn save_messages_assigns_sequences_per_thread() {
    let storage = storage();
    storage.save_thread(&thread_row("a", "user-1")).await.expect("a");
    storage.save_thread(&thread_row("b", "user-1")).await.expect("b");

    let first = storage
        .save_messages(message_batch("a", 3))
        .await
        .expect("first");
    assert_eq!(
        first.iter().map(|m| m.sequence).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );

    let mixed = vec![
        NewMessage::text("a", Role::User, "four"),
        NewMessage::text("b", Role::User, "one"),
        NewMessage::text("a", Role::Assistant, "five"),
    ];
    let saved = storage.save_messages(mixed).await.expect("mixed");
    let positions: Vec<(String, u64)> = saved
        .iter()
        .map(|m| (m.thread_id.clone(), m.sequence))
        .collect();
    assert_eq!(
        positions,
        vec![
            ("a".to_string(), 4),
            ("b".to_string(), 1),
            ("a".to_string(), 5)
        ]
    );
}

#[tokio::test]
async fn concurrent_appends_to_different_threads_do_not_interfere() {
    let storage = storage();
    storage.save_thread(&thread_row("a", "user-1")).await.expect("a");
    storage.save_thread(&thread_row("b", "user-1")).await.expect("b");

    let (left, right) = tokio::join!(
        async {
            let mut sequences = Vec::new();
            for message in message_batch("a", 4) {
                sequences.push(storage.add_message(message).await.expect("a").sequence);
            }
            sequences
        },
        async {
            let mut sequences = Vec::new();
            for message in message_batch("b", 3) {
                sequences.push(storage.add_message(message).await.expect("b").sequence);
            }
            sequences
        },
    );
    assert_eq!(left, vec![1, 2, 3, 4]);
    assert_eq!(right, vec![1, 2, 3]);
}

#[tokio::test]
async fn save_messages_creates_thread_for_resource() {
    let storage = storage();
    let saved = storage
        .add_message(NewMessage::text("fresh", Role::User, "hi").with_resource("user-9"))
        .await
        .expect("add");
    assert_eq!(saved.sequence, 1);
    let thread = storage
        .get_thread_by_id("fresh")
        .await
        .expect("get")
        .expect("created");
    assert_eq!(thread.resource_id, "user-9");
}

#[tokio::test]
async fn failed_append_creates_no_thread() {
    let store = Arc::new(FaultyStore::new(InMemoryStore::new()));
    let storage = AgentStorage::new(store.clone());
    store.fail_on("append_messages");
    let err = storage
        .add_message(NewMessage::text("fresh", Role::User, "hi").with_resource("user-9"))
        .await
        .expect_err("append fails");
    assert!(matches!(err, StorageError::Store(StoreError::Fault(_))));

    store.heal();
    assert_eq!(storage.get_thread_by_id("fresh").await.expect("get"), None);
    assert!(store.inner().is_empty(TableKind::Threads));
}

#[tokio::test]
async fn save_messages_without_thread_or_resource_fails_whole_batch() {
    let store = Arc::new(RecordingStore::new(InMemoryStore::new()));
    let storage = AgentStorage::new(store.clone());
    storage.save_thread(&thread_row("a", "user-1")).await.expect("a");

    let batch = vec![
        NewMessage::text("a", Role::User, "fine"),
        NewMessage::text("missing", Role::User, "orphan"),
    ];
    let err = storage.save_messages(batch).await.expect_err("orphan");
    assert!(matches!(err, StorageError::ThreadNotFound(ref id) if id == "missing"));
    assert!(
        !store
            .calls()
            .iter()
            .any(|call| matches!(call, RecordedCall::AppendMessages(_)))
    );
}

#[tokio::test]
async fn duplicate_message_id_is_rejected() {
    let storage = storage();
    let mut batch = message_batch("t1", 1);
    batch[0].resource_id = Some("user-1".to_string());
    storage.save_messages(batch.clone()).await.expect("first");
    let err = storage.save_messages(batch).await.expect_err("duplicate");
    assert!(matches!(
        err,
        StorageError::Store(StoreError::DuplicateKey { .. })
    ));
}

#[tokio::test]
async fn evals_filter_by_test_info() {
    let storage = storage();
    storage
        .insert(Row::Eval(eval_row("math", "live-1", None)))
        .await
        .expect("live");
    storage
        .insert(Row::Eval(eval_row(
            "math",
            "test-1",
            Some(json!({ "testName": "addition" })),
        )))
        .await
        .expect("test");
    storage
        .insert(Row::Eval(eval_row("poetry", "other", None)))
        .await
        .expect("other agent");

    let run_ids = |evals: Vec<strata_rs_protocol::EvalRow>| -> Vec<String> {
        evals.into_iter().map(|eval| eval.run_id).collect()
    };
    let all = storage
        .get_evals_by_agent_name("math", EvalFilter::All)
        .await
        .expect("all");
    assert_eq!(run_ids(all), vec!["test-1", "live-1"]);
    let test = storage
        .get_evals_by_agent_name("math", EvalFilter::Test)
        .await
        .expect("test");
    assert_eq!(run_ids(test), vec!["test-1"]);
    let live = storage
        .get_evals_by_agent_name("math", EvalFilter::Live)
        .await
        .expect("live");
    assert_eq!(run_ids(live), vec!["live-1"]);
}

#[tokio::test]
async fn traces_filter_and_page() {
    let store = Arc::new(RecordingStore::new(InMemoryStore::new()));
    let options = StorageOptions {
        trace_page_size: 3,
        ..StorageOptions::default()
    };
    let storage = AgentStorage::with_options(store.clone(), options);
    let mut rows = Vec::new();
    for n in 0..10 {
        let name = if n % 2 == 0 { "agent.generate" } else { "tool.call" };
        let attributes = object(json!({ "index": n, "component": "agent" }));
        rows.push(Row::Trace(trace_row(&format!("span-{n}"), name, "strata", attributes)));
    }
    storage
        .batch_insert(TableKind::Traces, rows)
        .await
        .expect("batch");
    store.reset();

    let query = TraceQuery {
        name: Some("agent.".to_string()),
        scope: Some("strata".to_string()),
        page: 1,
        per_page: 2,
        ..TraceQuery::default()
    };
    let ids: Vec<String> = storage
        .get_traces(&query)
        .await
        .expect("traces")
        .into_iter()
        .map(|trace| trace.id)
        .collect();
    assert_eq!(ids, vec!["span-4", "span-6"]);
    // Four matches are in the first seven rows: three pages of three.
    assert_eq!(store.paginate_count(), 3);

    let mut query = TraceQuery::default();
    query.attributes.insert("index".to_string(), "3".to_string());
    let ids: Vec<String> = storage
        .get_traces(&query)
        .await
        .expect("traces")
        .into_iter()
        .map(|trace| trace.id)
        .collect();
    assert_eq!(ids, vec!["span-3"]);

    store.reset();
    let empty_page = TraceQuery {
        per_page: 0,
        ..TraceQuery::default()
    };
    let err = storage.get_traces(&empty_page).await.expect_err("zero per_page");
    assert!(matches!(err, StorageError::InvalidQuery(_)));
    assert_eq!(store.paginate_count(), 0);
}

#[tokio::test]
async fn workflow_snapshot_is_last_write_wins() {
    let storage = storage();
    assert_eq!(
        storage
            .load_workflow_snapshot("onboarding", "run-1")
            .await
            .expect("load"),
        None
    );
    let first = storage
        .persist_workflow_snapshot("onboarding", "run-1", json!({ "step": 1 }))
        .await
        .expect("first");
    let second = storage
        .persist_workflow_snapshot("onboarding", "run-1", json!({ "step": 2 }))
        .await
        .expect("second");
    assert_eq!(second.created_at, first.created_at);

    let loaded = storage
        .load_workflow_snapshot("onboarding", "run-1")
        .await
        .expect("load")
        .expect("exists");
    assert_eq!(loaded.snapshot, json!({ "step": 2 }));
    assert_eq!(loaded.created_at, first.created_at);
    assert_eq!(loaded, second);
}

#[tokio::test]
async fn create_table_validates_columns() {
    let storage = storage();
    let mut columns = BTreeMap::new();
    columns.insert("id".to_string(), ColumnSpec::required(ColumnType::Text));
    columns.insert("resourceId".to_string(), ColumnSpec::required(ColumnType::Text));
    columns.insert("title".to_string(), ColumnSpec::nullable(ColumnType::Text));
    columns.insert("createdAt".to_string(), ColumnSpec::required(ColumnType::Timestamp));
    storage
        .create_table(TableKind::Threads, &columns)
        .await
        .expect("valid");

    columns.insert("colour".to_string(), ColumnSpec::nullable(ColumnType::Text));
    let err = storage
        .create_table(TableKind::Threads, &columns)
        .await
        .expect_err("unknown column");
    assert!(matches!(
        err,
        StorageError::Store(StoreError::SchemaMismatch { .. })
    ));
}

#[tokio::test]
async fn clear_table_deletes_across_pages() {
    let store = Arc::new(RecordingStore::new(InMemoryStore::new()));
    let options = StorageOptions {
        clear_page_size: 4,
        ..StorageOptions::default()
    };
    let storage = AgentStorage::with_options(store.clone(), options);
    let mut batch = message_batch("t1", 10);
    batch[0].resource_id = Some("user-1".to_string());
    storage.save_messages(batch).await.expect("seed");

    let cleared = storage.clear_table(TableKind::Messages).await.expect("clear");
    assert_eq!(cleared, 10);
    assert_eq!(store.inner().len(TableKind::Messages), 0);
    assert_eq!(store.inner().len(TableKind::Threads), 1);

    let mut message = NewMessage::text("t1", Role::User, "again");
    message.id = "after-clear".to_string();
    let saved = storage.add_message(message).await.expect("append after clear");
    assert_eq!(saved.sequence, 11);
}

#[tokio::test]
async fn batch_insert_rejects_foreign_rows() {
    let storage = storage();
    let err = storage
        .batch_insert(
            TableKind::Threads,
            vec![
                Row::Thread(thread_row("t1", "user-1")),
                Row::Eval(eval_row("math", "r", None)),
            ],
        )
        .await
        .expect_err("mismatch");
    assert!(matches!(
        err,
        StorageError::TableMismatch {
            expected: TableKind::Threads,
            found: TableKind::Evals
        }
    ));
    assert_eq!(storage.get_thread_by_id("t1").await.expect("get"), None);
}

#[tokio::test]
async fn generic_rows_load_by_key() {
    let storage = storage();
    let thread = thread_row("t1", "user-1");
    storage
        .batch_insert(TableKind::Threads, vec![Row::Thread(thread.clone())])
        .await
        .expect("threads");
    let mut message = NewMessage::text("t1", Role::User, "hello");
    message.id = "m1".to_string();
    storage
        .batch_insert(TableKind::Messages, vec![Row::Message(message)])
        .await
        .expect("messages");

    let loaded = storage
        .load(&RowKey::Thread("t1".to_string()))
        .await
        .expect("load");
    assert_eq!(loaded, Some(LoadedRow::Thread(thread)));

    let Some(LoadedRow::Message(message)) = storage
        .load(&RowKey::Message("m1".to_string()))
        .await
        .expect("load")
    else {
        panic!("expected a message");
    };
    assert_eq!(message.sequence, 1);

    assert_eq!(
        storage
            .load(&RowKey::Trace("nope".to_string()))
            .await
            .expect("load"),
        None
    );
}

//! CLI integration tests against a file-backed store.

use clap::Parser;
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::path::Path;
use strata_rs::cli::{Cli, run};
use strata_rs::config::StrataConfig;
use tempfile::tempdir;

async fn exec(root: &Path, args: &[&str]) -> anyhow::Result<Value> {
    let config = StrataConfig::builder()
        .file_backend(root.to_string_lossy())
        .build()
        .expect("config");
    let storage = strata_rs::open_storage(&config)?;
    let mut argv = vec!["strata"];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).expect("parse");
    run(&storage, cli.command).await
}

fn sequences(window: &Value) -> Vec<u64> {
    window["messages"]
        .as_array()
        .expect("messages")
        .iter()
        .map(|message| message["sequence"].as_u64().expect("sequence"))
        .collect()
}

#[tokio::test]
async fn messages_survive_reopen_and_window_reads_them() {
    let temp = tempdir().expect("tempdir");
    let root = temp.path();
    for n in 1..=6 {
        let text = format!("message {n}");
        exec(
            root,
            &["messages", "add", "--thread", "t1", "--resource", "user-1", &text],
        )
        .await
        .expect("add");
    }

    let window = exec(root, &["messages", "window", "--thread", "t1", "--last", "2"])
        .await
        .expect("window");
    assert_eq!(sequences(&window), vec![5, 6]);

    let threads = exec(root, &["threads", "list", "--resource", "user-1"])
        .await
        .expect("list");
    assert_eq!(threads.as_array().map(Vec::len), Some(1));
    assert_eq!(threads[0]["id"], "t1");
}

#[tokio::test]
async fn window_reports_missing_anchor() {
    let temp = tempdir().expect("tempdir");
    let root = temp.path();
    for text in ["a", "b", "c"] {
        exec(
            root,
            &["messages", "add", "--thread", "t1", "--resource", "user-1", text],
        )
        .await
        .expect("add");
    }
    let window = exec(
        root,
        &[
            "messages",
            "window",
            "--thread",
            "t1",
            "--no-recency",
            "--anchor",
            "ghost:1:1",
        ],
    )
    .await
    .expect("window");
    assert_eq!(sequences(&window), Vec::<u64>::new());
    assert_eq!(window["missingAnchors"], serde_json::json!(["ghost"]));
}

#[tokio::test]
async fn thread_lifecycle() {
    let temp = tempdir().expect("tempdir");
    let root = temp.path();
    let created = exec(
        root,
        &["threads", "create", "--resource", "user-1", "--id", "t9", "--title", "Plans"],
    )
    .await
    .expect("create");
    assert_eq!(created["title"], "Plans");

    let updated = exec(
        root,
        &["threads", "update", "t9", "--metadata", r#"{"pinned":true}"#],
    )
    .await
    .expect("update");
    assert_eq!(updated["title"], "Plans");
    assert_eq!(updated["metadata"]["pinned"], true);

    exec(root, &["threads", "delete", "t9"]).await.expect("delete");
    let err = exec(root, &["threads", "delete", "t9"])
        .await
        .expect_err("already gone");
    assert!(format!("{err}").contains("thread not found: t9"));
}

#[tokio::test]
async fn clear_messages_table() {
    let temp = tempdir().expect("tempdir");
    let root = temp.path();
    exec(
        root,
        &["messages", "add", "--thread", "t1", "--resource", "user-1", "hello"],
    )
    .await
    .expect("add");
    let cleared = exec(root, &["tables", "clear", "messages"]).await.expect("clear");
    assert_eq!(cleared["deleted"], 1);

    let err = exec(root, &["tables", "clear", "numbers"])
        .await
        .expect_err("unknown table");
    assert!(format!("{err}").contains("unsupported table name"));
}

#[tokio::test]
async fn missing_snapshot_is_an_error() {
    let temp = tempdir().expect("tempdir");
    let err = exec(temp.path(), &["snapshots", "get", "onboarding", "run-1"])
        .await
        .expect_err("missing");
    assert!(format!("{err}").contains("no snapshot for onboarding/run-1"));
}

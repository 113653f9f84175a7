//! Command-line interface for inspecting and editing a Strata store.

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value, json};
use std::path::PathBuf;
use strata_rs_core::{AgentStorage, ThreadDraft};
use strata_rs_protocol::{
    Anchor, MessageWindowRequest, NewMessage, RecencyLimit, Role, TableKind, ThreadUpdate,
};

/// Command-line options for the `strata` binary.
#[derive(Debug, Parser)]
#[command(name = "strata", version)]
pub struct Cli {
    /// Optional path to a strata.json5 config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage threads
    #[command(subcommand)]
    Threads(ThreadCommand),
    /// Append and read messages
    #[command(subcommand)]
    Messages(MessageCommand),
    /// Table maintenance
    #[command(subcommand)]
    Tables(TableCommand),
    /// Read workflow snapshots
    #[command(subcommand)]
    Snapshots(SnapshotCommand),
}

#[derive(Debug, Subcommand)]
pub enum ThreadCommand {
    /// List the threads of a resource
    List {
        #[arg(long)]
        resource: String,
    },
    /// Create a thread
    Create {
        #[arg(long)]
        resource: String,
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        title: Option<String>,
        /// Metadata as a JSON object
        #[arg(long, value_parser = parse_metadata)]
        metadata: Option<Map<String, Value>>,
    },
    /// Change a thread's title or metadata
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        /// Metadata as a JSON object; replaces the stored metadata
        #[arg(long, value_parser = parse_metadata)]
        metadata: Option<Map<String, Value>>,
    },
    /// Delete a thread (its messages are kept)
    Delete { id: String },
}

#[derive(Debug, Subcommand)]
pub enum MessageCommand {
    /// Append a text message
    Add {
        #[arg(long)]
        thread: String,
        /// Owner used if the thread has to be created
        #[arg(long)]
        resource: Option<String>,
        #[arg(long, default_value = "user", value_parser = parse_role)]
        role: Role,
        text: String,
    },
    /// Read a message window
    Window(WindowArgs),
    /// Show one message
    Get { id: String },
}

#[derive(Debug, Args)]
pub struct WindowArgs {
    #[arg(long)]
    pub thread: String,
    /// Require the thread to belong to this resource
    #[arg(long)]
    pub resource: Option<String>,
    /// Number of most recent messages
    #[arg(long, conflicts_with = "no_recency")]
    pub last: Option<usize>,
    /// Skip the recency window entirely
    #[arg(long)]
    pub no_recency: bool,
    /// `id` or `id:before:after`; repeatable
    #[arg(long = "anchor", value_parser = parse_anchor)]
    pub anchors: Vec<Anchor>,
}

#[derive(Debug, Subcommand)]
pub enum TableCommand {
    /// Delete every row of a table
    Clear { table: String },
}

#[derive(Debug, Subcommand)]
pub enum SnapshotCommand {
    /// Show the snapshot of a workflow run
    Get { workflow: String, run_id: String },
}

fn parse_metadata(raw: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("metadata must be a JSON object".to_string()),
        Err(err) => Err(err.to_string()),
    }
}

fn parse_role(raw: &str) -> Result<Role, String> {
    raw.parse()
}

/// Parse `id` or `id:before:after`.
pub fn parse_anchor(raw: &str) -> Result<Anchor, String> {
    let mut parts = raw.rsplitn(3, ':').collect::<Vec<_>>();
    if parts.len() != 3 {
        if raw.is_empty() {
            return Err("anchor id is empty".to_string());
        }
        return Ok(Anchor::new(raw));
    }
    parts.reverse();
    let before = parts[1]
        .parse::<u64>()
        .map_err(|err| format!("invalid before count in {raw}: {err}"))?;
    let after = parts[2]
        .parse::<u64>()
        .map_err(|err| format!("invalid after count in {raw}: {err}"))?;
    if parts[0].is_empty() {
        return Err("anchor id is empty".to_string());
    }
    Ok(Anchor::with_context(parts[0], before, after))
}

/// Execute `command` and return its JSON result.
pub async fn run(storage: &AgentStorage, command: Command) -> anyhow::Result<Value> {
    match command {
        Command::Threads(command) => run_threads(storage, command).await,
        Command::Messages(command) => run_messages(storage, command).await,
        Command::Tables(TableCommand::Clear { table }) => {
            let kind: TableKind = table.parse()?;
            let deleted = storage
                .clear_table(kind)
                .await
                .with_context(|| format!("failed to clear {kind}"))?;
            Ok(json!({ "table": kind.framework_name(), "deleted": deleted }))
        }
        Command::Snapshots(SnapshotCommand::Get { workflow, run_id }) => {
            let Some(snapshot) = storage.load_workflow_snapshot(&workflow, &run_id).await? else {
                bail!("no snapshot for {workflow}/{run_id}");
            };
            Ok(serde_json::to_value(snapshot)?)
        }
    }
}

async fn run_threads(storage: &AgentStorage, command: ThreadCommand) -> anyhow::Result<Value> {
    match command {
        ThreadCommand::List { resource } => {
            let threads = storage.get_threads_by_resource_id(&resource).await?;
            Ok(serde_json::to_value(threads)?)
        }
        ThreadCommand::Create {
            resource,
            id,
            title,
            metadata,
        } => {
            let draft = ThreadDraft {
                id,
                resource_id: resource,
                title,
                metadata,
            };
            Ok(serde_json::to_value(storage.create_thread(draft).await?)?)
        }
        ThreadCommand::Update {
            id,
            title,
            metadata,
        } => {
            let update = ThreadUpdate { title, metadata };
            if update.is_empty() {
                bail!("nothing to update; pass --title or --metadata");
            }
            Ok(serde_json::to_value(storage.update_thread(&id, update).await?)?)
        }
        ThreadCommand::Delete { id } => {
            storage.delete_thread(&id).await?;
            Ok(json!({ "deleted": id }))
        }
    }
}

async fn run_messages(storage: &AgentStorage, command: MessageCommand) -> anyhow::Result<Value> {
    match command {
        MessageCommand::Add {
            thread,
            resource,
            role,
            text,
        } => {
            let mut message = NewMessage::text(thread, role, text);
            message.resource_id = resource;
            Ok(serde_json::to_value(storage.add_message(message).await?)?)
        }
        MessageCommand::Window(args) => {
            let mut request = MessageWindowRequest::new(args.thread);
            request.resource_id = args.resource;
            request.anchors = args.anchors;
            if args.no_recency {
                request.recency = Some(RecencyLimit::Disabled);
            } else if let Some(last) = args.last {
                request.recency = Some(RecencyLimit::Last(last));
            }
            let window = storage.get_message_window(request).await?;
            Ok(json!({
                "messages": window.messages,
                "missingAnchors": window.missing_anchors,
            }))
        }
        MessageCommand::Get { id } => Ok(serde_json::to_value(storage.get_message(&id).await?)?),
    }
}

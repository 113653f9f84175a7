//! Storage adapter core for Strata.
//!
//! This crate owns the row codec, the message window resolver, and the
//! `AgentStorage` facade that agent frameworks call to persist threads,
//! messages, evaluations, traces, and workflow snapshots.

pub mod codec;
pub mod error;
pub mod storage;
pub mod window;

/// Row codec.
pub use codec::Transcode;
/// Adapter error types.
pub use error::{StorageError, TranscodeError};
/// Storage facade and its request types.
pub use storage::{AgentStorage, EvalFilter, MessageWindow, StorageOptions, ThreadDraft, TraceQuery};
/// Window planning.
pub use window::{MessageWindowResolver, ResolvedWindow, contiguous_runs};

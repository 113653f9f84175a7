//! Test helpers shared across Strata crates.

pub mod faulty;
pub mod fixtures;
pub mod recording;

pub use faulty::FaultyStore;
pub use fixtures::{eval_row, fixed_time, message_batch, thread_row, trace_row};
pub use recording::{RecordedCall, RecordingStore};

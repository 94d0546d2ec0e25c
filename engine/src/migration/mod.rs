//! The migration run itself: per-item transcoding, the per-vault state
//! machine, progress fan-out, and the append-only run log.
//!
//! The orchestrator is the entry point; it drives two `VaultAccount`
//! implementations (source and destination) and the custom-item bridge,
//! and reports through `ProgressSink` and `RunLog`.

pub mod orchestrator;
pub mod progress;
pub mod run_log;
pub mod transcode;
pub mod types;

#[cfg(test)]
mod orchestrator_test;

pub use orchestrator::MigrationOrchestrator;
pub use progress::{ProgressEvent, ProgressSink};
pub use run_log::{LogLevel, RunLog, RunLogEntry};
pub use transcode::{transcode, Transcoded};
pub use types::*;

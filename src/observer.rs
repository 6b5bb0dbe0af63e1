//! Stage checkpoints for the association pipeline.
//!
//! The algorithm never logs directly; it reports stage starts, finishes, and
//! skips to an injected observer. [`LogObserver`] forwards to the `log`
//! macros and is what the CLI installs; [`SilentObserver`] is for embedding
//! and tests.

use std::fmt;

use log::info;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Align,
    Filter,
    Score,
    Sort,
    Bootstrap,
    Permutation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Align => "align",
            Stage::Filter => "filter",
            Stage::Score => "score",
            Stage::Sort => "sort",
            Stage::Bootstrap => "bootstrap",
            Stage::Permutation => "permutation",
        };
        f.write_str(name)
    }
}

/// Checkpoint sink invoked by the orchestrator. All methods default to
/// no-ops so implementors override only what they need.
pub trait StageObserver: Sync {
    fn stage_started(&self, stage: Stage, detail: &str) {
        let _ = (stage, detail);
    }

    fn stage_finished(&self, stage: Stage, detail: &str) {
        let _ = (stage, detail);
    }

    /// A skippable stage's preconditions were unmet. Not an error; the
    /// stage's output columns stay absent and the pipeline continues.
    fn stage_skipped(&self, stage: Stage, reason: &str) {
        let _ = (stage, reason);
    }
}

/// Forwards checkpoints to the `log` crate.
pub struct LogObserver;

impl StageObserver for LogObserver {
    fn stage_started(&self, stage: Stage, detail: &str) {
        info!("[{}] {}", stage, detail);
    }

    fn stage_finished(&self, stage: Stage, detail: &str) {
        info!("[{}] done: {}", stage, detail);
    }

    fn stage_skipped(&self, stage: Stage, reason: &str) {
        info!("[{}] skipped: {}", stage, reason);
    }
}

/// Discards all checkpoints.
pub struct SilentObserver;

impl StageObserver for SilentObserver {}

//! Run reports: per-step records, the run summary, and the final report.
//!
//! `StepOutcome` is a three-case enum rather than a trio of nullable fields
//! so that "exactly one of outputs, error, skipped" holds by construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Terminal state of one executed (or skipped) step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    /// The model ran and returned an output mapping.
    Succeeded {
        /// Outputs returned by the sandbox.
        outputs: Map<String, Value>,
    },
    /// The step was attempted and failed; the run continued.
    Failed {
        /// Human-readable failure description.
        error: String,
    },
    /// The step's run condition evaluated false; nothing was attempted.
    Skipped,
}

impl StepOutcome {
    /// Outputs when the step succeeded, `None` otherwise.
    pub fn outputs(&self) -> Option<&Map<String, Value>> {
        match self {
            StepOutcome::Succeeded { outputs } => Some(outputs),
            _ => None,
        }
    }

    /// Error text when the step failed, `None` otherwise.
    pub fn error(&self) -> Option<&str> {
        match self {
            StepOutcome::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// True when the step was skipped by its condition.
    pub fn is_skipped(&self) -> bool {
        matches!(self, StepOutcome::Skipped)
    }
}

/// Record of a single step within a report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepRecord {
    /// Step identifier from the playbook.
    pub id: String,
    /// Inputs as resolved for this step; empty when the step was skipped
    /// before resolution.
    pub inputs: Map<String, Value>,
    /// Terminal state of the step.
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Aggregate counts over a report's step records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Number of step records in the report.
    pub total: usize,
    /// Steps that ran to completion.
    pub executed: usize,
    /// Steps skipped by their condition.
    pub skipped: usize,
    /// Steps that were attempted and failed.
    pub failed: usize,
    /// True exactly when no step failed.
    pub success: bool,
}

impl RunSummary {
    /// Tallies a summary from step records.
    ///
    /// Upholds `executed + skipped + failed == total` and
    /// `success == (failed == 0)` for any input.
    pub fn tally(records: &[StepRecord]) -> Self {
        let mut summary = RunSummary {
            total: records.len(),
            ..Default::default()
        };
        for record in records {
            match record.outcome {
                StepOutcome::Succeeded { .. } => summary.executed += 1,
                StepOutcome::Failed { .. } => summary.failed += 1,
                StepOutcome::Skipped => summary.skipped += 1,
            }
        }
        summary.success = summary.failed == 0;
        summary
    }
}

/// Immutable result of one playbook run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookReport {
    /// Playbook identifier.
    pub playbook: String,
    /// Playbook document version.
    pub version: String,
    /// Snapshot of the intake values supplied for the run.
    pub intake: Map<String, Value>,
    /// Wall-clock start of the run.
    pub started_at: DateTime<Utc>,
    /// Wall-clock end of the run.
    pub finished_at: DateTime<Utc>,
    /// Ordered step records, one per declared step.
    pub steps: Vec<StepRecord>,
    /// Aggregate counts over `steps`.
    pub summary: RunSummary,
}

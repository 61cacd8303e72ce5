//! # Tally Types
//!
//! Shared type definitions for the Tally playbook engine: playbook and model
//! documents, run reports, and the error taxonomy. Behavior lives in
//! `tally-engine`; this crate is deliberately limited to data shapes so the
//! engine and its file-backed collaborators agree on one vocabulary.

pub mod error;
pub mod model;
pub mod playbook;
pub mod report;

pub use error::{EngineError, ExpressionError, SandboxPhase};
pub use model::{LoadedModel, ModelInputSpec, ModelManifest};
pub use playbook::{InputBinding, IntakeFieldSpec, IntakeFieldType, OnErrorPolicy, PlaybookSpec, StepSpec};
pub use report::{PlaybookReport, RunSummary, StepOutcome, StepRecord};

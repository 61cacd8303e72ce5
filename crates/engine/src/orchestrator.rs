//! Playbook orchestration.
//!
//! Drives an ordered step list through the per-step state machine
//! `PENDING → SKIPPED | RUNNING → SUCCEEDED | FAILED`, delegating model
//! loading and input validation to external collaborators and payload
//! execution to the sandbox. Steps run strictly sequentially on the
//! caller's thread; report ordering is deterministic and later steps are
//! free to derive inputs from the same intake the earlier ones saw.
//!
//! Failure propagation follows each step's policy: `warn_and_continue`
//! turns the failure into data inside the step record, `abort` raises
//! [`EngineError::Aborted`] and records nothing further.

use chrono::Utc;
use serde_json::{Map, Value};
use tally_types::{
    EngineError, LoadedModel, ModelManifest, OnErrorPolicy, PlaybookReport, PlaybookSpec, RunSummary, StepOutcome, StepRecord,
    StepSpec,
};
use tracing::{debug, warn};

use crate::{condition::evaluate_condition, resolve::resolve_step_inputs, sandbox::Sandbox};

/// External collaborator that fetches a model by id.
pub trait ModelLoader {
    /// Returns the manifest and logic payload for `model_id`, or a typed
    /// failure when the model or its files are missing or malformed.
    fn load(&self, model_id: &str) -> Result<LoadedModel, EngineError>;
}

/// External collaborator that checks resolved inputs against a manifest.
pub trait InputValidator {
    /// Ok when the inputs satisfy the manifest; otherwise the complete list
    /// of violations.
    fn validate(&self, manifest: &ModelManifest, inputs: &Map<String, Value>) -> Result<(), Vec<String>>;
}

/// Executes playbooks against a loader/validator pair.
pub struct PlaybookRunner<'a> {
    loader: &'a dyn ModelLoader,
    validator: &'a dyn InputValidator,
    sandbox: Sandbox,
}

/// Internal step failure before policy is applied.
struct StepFailure {
    inputs: Map<String, Value>,
    reason: String,
}

impl<'a> PlaybookRunner<'a> {
    /// Runner with the default sandbox budget.
    pub fn new(loader: &'a dyn ModelLoader, validator: &'a dyn InputValidator) -> Self {
        PlaybookRunner {
            loader,
            validator,
            sandbox: Sandbox::new(),
        }
    }

    /// Runner with a caller-configured sandbox.
    pub fn with_sandbox(loader: &'a dyn ModelLoader, validator: &'a dyn InputValidator, sandbox: Sandbox) -> Self {
        PlaybookRunner { loader, validator, sandbox }
    }

    /// Runs every step of `spec` in declaration order and assembles the
    /// report.
    ///
    /// Intake values are validated against the playbook schema before the
    /// first step executes; any violation fails the entire run up front.
    pub fn run(&self, spec: &PlaybookSpec, intake: &Map<String, Value>) -> Result<PlaybookReport, EngineError> {
        validate_intake(spec, intake)?;
        let started_at = Utc::now();
        debug!(playbook = %spec.id, steps = spec.steps.len(), "starting playbook run");

        let mut records = Vec::with_capacity(spec.steps.len());
        for step in &spec.steps {
            match self.run_step(step, intake) {
                Ok(record) => records.push(record),
                Err(failure) => match step.on_error {
                    OnErrorPolicy::Abort => {
                        return Err(EngineError::Aborted {
                            playbook: spec.id.clone(),
                            step: step.id.clone(),
                            reason: failure.reason,
                        });
                    }
                    OnErrorPolicy::WarnAndContinue => {
                        warn!(playbook = %spec.id, step = %step.id, error = %failure.reason, "step failed; continuing");
                        records.push(StepRecord {
                            id: step.id.clone(),
                            inputs: failure.inputs,
                            outcome: StepOutcome::Failed { error: failure.reason },
                        });
                    }
                },
            }
        }

        let summary = RunSummary::tally(&records);
        debug!(
            playbook = %spec.id,
            executed = summary.executed,
            skipped = summary.skipped,
            failed = summary.failed,
            "playbook run finished"
        );
        Ok(PlaybookReport {
            playbook: spec.id.clone(),
            version: spec.version.clone(),
            intake: intake.clone(),
            started_at,
            finished_at: Utc::now(),
            steps: records,
            summary,
        })
    }

    fn run_step(&self, step: &StepSpec, intake: &Map<String, Value>) -> Result<StepRecord, StepFailure> {
        // A declared condition that evaluates false skips the step before
        // any inputs are resolved or collaborators consulted.
        if let Some(condition) = &step.when {
            match evaluate_condition(condition, intake) {
                Ok(true) => {}
                Ok(false) => {
                    debug!(step = %step.id, condition = %condition, "step skipped by condition");
                    return Ok(StepRecord {
                        id: step.id.clone(),
                        inputs: Map::new(),
                        outcome: StepOutcome::Skipped,
                    });
                }
                Err(error) => {
                    return Err(StepFailure {
                        inputs: Map::new(),
                        reason: format!("condition failed to evaluate: {error}"),
                    });
                }
            }
        }

        let inputs = resolve_step_inputs(&step.inputs, intake).map_err(|error| StepFailure {
            inputs: Map::new(),
            reason: format!("input resolution failed: {error}"),
        })?;

        let model = self.loader.load(&step.model).map_err(|error| StepFailure {
            inputs: inputs.clone(),
            reason: error.to_string(),
        })?;

        if let Err(violations) = self.validator.validate(&model.manifest, &inputs) {
            return Err(StepFailure {
                inputs,
                reason: format!("input validation failed: {}", violations.join("; ")),
            });
        }

        let outputs = self
            .sandbox
            .execute(&model.logic, &Value::Object(inputs.clone()))
            .map_err(|error| StepFailure {
                inputs: inputs.clone(),
                reason: error.to_string(),
            })?;

        Ok(StepRecord {
            id: step.id.clone(),
            inputs,
            outcome: StepOutcome::Succeeded { outputs },
        })
    }
}

/// Validates intake values against the playbook's declared schema.
///
/// Collects every violation (missing required fields, wrong primitive
/// types) rather than stopping at the first; undeclared extra fields pass
/// through untouched.
fn validate_intake(spec: &PlaybookSpec, intake: &Map<String, Value>) -> Result<(), EngineError> {
    let mut violations = Vec::new();
    for (field, declaration) in &spec.intake {
        match intake.get(field) {
            None => {
                if declaration.required {
                    violations.push(format!("missing required intake field '{field}'"));
                }
            }
            Some(value) => {
                if !declaration.field_type.matches(value) {
                    violations.push(format!(
                        "intake field '{field}' must be a {}, got {}",
                        declaration.field_type.name(),
                        value_type_name(value)
                    ));
                }
            }
        }
    }
    if violations.is_empty() {
        Ok(())
    } else {
        Err(EngineError::IntakeValidation { violations })
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

//! End-to-end playbook runs against an in-memory model library.

use serde_json::{Map, Value, json};
use tally_engine::{InputValidator, ModelLoader, PlaybookRunner};
use tally_types::{EngineError, LoadedModel, ModelManifest, PlaybookSpec, StepOutcome};

/// Loader backed by a fixed set of (manifest, payload) pairs.
struct Library {
    models: Vec<(ModelManifest, &'static str)>,
}

impl Library {
    fn standard() -> Self {
        let double_manifest: ModelManifest = serde_yaml::from_str(
            r#"
id: "double"
inputs:
  value:
    type: number
"#,
        )
        .expect("double manifest");
        let sum_manifest: ModelManifest = serde_yaml::from_str(
            r#"
id: "sum"
inputs:
  base:
    type: number
  bonus:
    type: number
"#,
        )
        .expect("sum manifest");
        Library {
            models: vec![
                (double_manifest, "compute { return { \"doubled\": inputs.value * 2 } }"),
                (sum_manifest, "compute { return { \"total\": inputs.base + inputs.bonus } }"),
            ],
        }
    }
}

impl ModelLoader for Library {
    fn load(&self, model_id: &str) -> Result<LoadedModel, EngineError> {
        self.models
            .iter()
            .find(|(manifest, _)| manifest.id == model_id)
            .map(|(manifest, logic)| LoadedModel {
                manifest: manifest.clone(),
                logic: (*logic).to_string(),
            })
            .ok_or_else(|| EngineError::ModelNotFound(model_id.to_string()))
    }
}

/// Validator enforcing manifest presence and primitive types.
struct SchemaValidator;

impl InputValidator for SchemaValidator {
    fn validate(&self, manifest: &ModelManifest, inputs: &Map<String, Value>) -> Result<(), Vec<String>> {
        let mut violations = Vec::new();
        for (id, declaration) in &manifest.inputs {
            match inputs.get(id) {
                None if declaration.required => violations.push(format!("missing required input '{id}'")),
                Some(value) if !declaration.input_type.matches(value) => {
                    violations.push(format!("input '{id}' must be a {}", declaration.input_type.name()));
                }
                _ => {}
            }
        }
        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }
}

fn intake(entries: &[(&str, Value)]) -> Map<String, Value> {
    entries.iter().map(|(key, value)| (key.to_string(), value.clone())).collect()
}

fn parse_playbook(document: &str) -> PlaybookSpec {
    serde_yaml::from_str(document).expect("parse playbook")
}

#[test]
fn field_reference_and_derived_inputs_flow_into_models() {
    let spec = parse_playbook(
        r#"
id: "salary-review"
version: "1"
intake:
  salary:
    type: number
steps:
  - id: "double-it"
    model: "double"
    inputs:
      value: "intake.salary"
  - id: "with-raise"
    model: "double"
    inputs:
      value:
        derived: "intake.salary + 5000"
"#,
    );

    let library = Library::standard();
    let runner = PlaybookRunner::new(&library, &SchemaValidator);
    let report = runner.run(&spec, &intake(&[("salary", json!(50000))])).expect("run");

    assert_eq!(report.playbook, "salary-review");
    assert_eq!(report.version, "1");
    assert_eq!(report.intake["salary"], json!(50000));
    assert!(report.finished_at >= report.started_at);

    let first = report.steps[0].outcome.outputs().expect("first outputs");
    assert_eq!(first["doubled"], json!(100000));
    assert_eq!(report.steps[0].inputs["value"], json!(50000));

    let second = report.steps[1].outcome.outputs().expect("second outputs");
    assert_eq!(second["doubled"], json!(110000));
    assert_eq!(report.steps[1].inputs["value"], json!(55000.0));

    assert_eq!(report.summary.total, 2);
    assert_eq!(report.summary.executed, 2);
    assert!(report.summary.success);
}

#[test]
fn false_condition_skips_without_failing_the_run() {
    let spec = parse_playbook(
        r#"
id: "retirement-check"
version: "2"
intake:
  age:
    type: number
  salary:
    type: number
steps:
  - id: "senior-only"
    model: "double"
    when: "intake.age > 65"
    inputs:
      value: "intake.salary"
  - id: "always"
    model: "double"
    inputs:
      value: "intake.salary"
"#,
    );

    let library = Library::standard();
    let runner = PlaybookRunner::new(&library, &SchemaValidator);
    let report = runner
        .run(&spec, &intake(&[("age", json!(30)), ("salary", json!(1000))]))
        .expect("run");

    assert!(matches!(report.steps[0].outcome, StepOutcome::Skipped));
    assert!(report.steps[1].outcome.outputs().is_some());
    assert_eq!(report.summary.total, 2);
    assert_eq!(report.summary.skipped, 1);
    assert_eq!(report.summary.executed, 1);
    assert_eq!(report.summary.failed, 0);
    assert!(report.summary.success);
}

#[test]
fn manifest_type_mismatch_fails_the_step_but_not_the_run() {
    let spec = parse_playbook(
        r#"
id: "mixed"
version: "1"
steps:
  - id: "bad-input"
    model: "double"
    inputs:
      value: "a plain string, not a field reference"
  - id: "good-input"
    model: "double"
    inputs:
      value: 7
"#,
    );

    let library = Library::standard();
    let runner = PlaybookRunner::new(&library, &SchemaValidator);
    let report = runner.run(&spec, &Map::new()).expect("run");

    let error = report.steps[0].outcome.error().expect("type violation");
    assert!(error.contains("input 'value' must be a number"));
    assert_eq!(report.steps[1].outcome.outputs().expect("second outputs")["doubled"], json!(14));

    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.executed, 1);
    assert!(!report.summary.success);
}

#[test]
fn abort_step_stops_the_run_with_a_typed_error() {
    let spec = parse_playbook(
        r#"
id: "strict"
version: "1"
steps:
  - id: "first"
    model: "double"
    inputs:
      value: 1
  - id: "gatekeeper"
    model: "no-such-model"
    on_error: abort
  - id: "unreached"
    model: "double"
    inputs:
      value: 2
"#,
    );

    let library = Library::standard();
    let runner = PlaybookRunner::new(&library, &SchemaValidator);
    let error = runner.run(&spec, &Map::new()).expect_err("abort");

    match error {
        EngineError::Aborted { playbook, step, reason } => {
            assert_eq!(playbook, "strict");
            assert_eq!(step, "gatekeeper");
            assert!(reason.contains("no-such-model"));
        }
        other => panic!("expected Aborted, got {other:?}"),
    }
}

#[test]
fn intake_validation_reports_every_violation_up_front() {
    let spec = parse_playbook(
        r#"
id: "typed"
version: "1"
intake:
  salary:
    type: number
  employed:
    type: boolean
steps:
  - id: "first"
    model: "double"
    inputs:
      value: "intake.salary"
"#,
    );

    let library = Library::standard();
    let runner = PlaybookRunner::new(&library, &SchemaValidator);
    let error = runner
        .run(&spec, &intake(&[("salary", json!("lots"))]))
        .expect_err("violations");

    match error {
        EngineError::IntakeValidation { violations } => {
            assert_eq!(violations.len(), 2);
            assert!(violations.iter().any(|v| v.contains("'salary'") && v.contains("number")));
            assert!(violations.iter().any(|v| v.contains("'employed'") && v.contains("missing")));
        }
        other => panic!("expected IntakeValidation, got {other:?}"),
    }
}

#[test]
fn multi_input_model_combines_literal_and_derived_values() {
    let spec = parse_playbook(
        r#"
id: "payroll"
version: "1"
intake:
  base:
    type: number
steps:
  - id: "total"
    model: "sum"
    inputs:
      base: "intake.base"
      bonus:
        derived: "intake.base / 10"
"#,
    );

    let library = Library::standard();
    let runner = PlaybookRunner::new(&library, &SchemaValidator);
    let report = runner.run(&spec, &intake(&[("base", json!(2000))])).expect("run");

    let outputs = report.steps[0].outcome.outputs().expect("outputs");
    assert_eq!(outputs["total"], json!(2200));
    let report_json = serde_json::to_value(&report).expect("serialize report");
    assert_eq!(report_json["steps"][0]["status"], json!("succeeded"));
    assert_eq!(report_json["summary"]["success"], json!(true));
}

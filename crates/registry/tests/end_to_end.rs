//! Full pipeline: playbook document on disk, model bundles on disk, run.

use std::path::Path;

use serde_json::{Map, Value, json};
use tally_engine::{EngineConfig, PlaybookRunner};
use tally_registry::{ManifestValidator, RegistryConfig};

fn write_model(root: &Path, id: &str, manifest: &str, logic: &str) {
    let dir = root.join(id);
    std::fs::create_dir_all(&dir).expect("create model dir");
    std::fs::write(dir.join("manifest.yaml"), manifest).expect("write manifest");
    std::fs::write(dir.join("logic.calc"), logic).expect("write logic");
}

fn intake(entries: &[(&str, Value)]) -> Map<String, Value> {
    entries.iter().map(|(key, value)| (key.to_string(), value.clone())).collect()
}

#[test]
fn retirement_playbook_runs_from_disk() {
    let models = tempfile::tempdir().expect("models dir");
    let playbooks = tempfile::tempdir().expect("playbooks dir");

    write_model(
        models.path(),
        "projection",
        r#"
id: "projection"
inputs:
  principal:
    type: number
  rate:
    type: number
  periods:
    type: number
"#,
        r#"
# Compound growth over a fixed number of periods.
compute {
  let balance = inputs.principal
  repeat inputs.periods {
    let balance = balance * (1 + inputs.rate)
  }
  return { "balance": round(balance, 2) }
}
"#,
    );
    write_model(
        models.path(),
        "bonus",
        r#"
id: "bonus"
inputs:
  salary:
    type: number
"#,
        r#"compute { return { "bonus": inputs.salary / 10 } }"#,
    );

    std::fs::write(
        playbooks.path().join("retirement.yaml"),
        r#"
id: "retirement"
version: "4"
intake:
  salary:
    type: number
  age:
    type: number
steps:
  - id: "grow"
    model: "projection"
    inputs:
      principal: "intake.salary"
      rate: 0.05
      periods: 3
  - id: "senior-bonus"
    model: "bonus"
    when: "intake.age > 65"
    inputs:
      salary: "intake.salary"
    on_error: abort
"#,
    )
    .expect("write playbook");

    let config = RegistryConfig {
        models_root: models.path().into(),
        playbooks_root: playbooks.path().into(),
    };
    let library = config.playbook_library();
    let catalog = config.model_catalog();
    let spec = library.resolve("retirement").expect("resolve playbook");
    let runner = PlaybookRunner::with_sandbox(&catalog, &ManifestValidator, EngineConfig::from_env().sandbox());

    let report = runner
        .run(&spec, &intake(&[("salary", json!(1000)), ("age", json!(30))]))
        .expect("run");

    assert_eq!(report.playbook, "retirement");
    let grown = report.steps[0].outcome.outputs().expect("projection outputs");
    assert_eq!(grown["balance"], json!(1157.62));
    assert!(report.steps[1].outcome.is_skipped());
    assert_eq!(report.summary.executed, 1);
    assert_eq!(report.summary.skipped, 1);
    assert!(report.summary.success);

    // Older intake crosses the condition and runs the abort-guarded step.
    let report = runner
        .run(&spec, &intake(&[("salary", json!(1000)), ("age", json!(70))]))
        .expect("run for senior");
    let bonus = report.steps[1].outcome.outputs().expect("bonus outputs");
    assert_eq!(bonus["bonus"], json!(100));
    assert_eq!(report.summary.executed, 2);
}

//! Manifest-backed input validation.

use serde_json::{Map, Value};
use tally_engine::InputValidator;
use tally_types::ModelManifest;

/// Checks resolved step inputs against a model manifest.
///
/// Collects every violation in declaration order rather than stopping at
/// the first, so a step failure message names everything wrong at once.
/// Inputs the manifest does not declare are violations too; a model only
/// receives what it asked for.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestValidator;

impl InputValidator for ManifestValidator {
    fn validate(&self, manifest: &ModelManifest, inputs: &Map<String, Value>) -> Result<(), Vec<String>> {
        let mut violations = Vec::new();
        for (id, declaration) in &manifest.inputs {
            match inputs.get(id) {
                None => {
                    if declaration.required {
                        violations.push(format!("missing required input '{id}'"));
                    }
                }
                Some(value) => {
                    if !declaration.input_type.matches(value) {
                        violations.push(format!(
                            "input '{id}' must be a {}, got {}",
                            declaration.input_type.name(),
                            json_type_name(value)
                        ));
                    }
                }
            }
        }
        for id in inputs.keys() {
            if !manifest.inputs.contains_key(id) {
                violations.push(format!("undeclared input '{id}'"));
            }
        }
        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

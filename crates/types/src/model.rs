//! Model manifests and loaded model bundles.
//!
//! A model is a declarative computation unit: a typed input schema (the
//! manifest) plus an opaque logic payload executed by the sandbox. Manifests
//! are authored beside their payloads and loaded by an external
//! `ModelLoader` collaborator.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::playbook::IntakeFieldType;

/// Typed schema for one model.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelManifest {
    /// Stable model identifier; matches the `model` field of a step.
    pub id: String,

    /// Optional human-friendly display name.
    #[serde(default)]
    pub name: Option<String>,

    /// Optional description of what the computation does.
    #[serde(default)]
    pub description: Option<String>,

    /// Declared inputs, keyed by input id. Resolved step inputs are checked
    /// against these declarations before the payload runs.
    #[serde(default)]
    pub inputs: IndexMap<String, ModelInputSpec>,
}

/// Declaration of a single model input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInputSpec {
    /// Primitive type the resolved value must have.
    #[serde(rename = "type")]
    pub input_type: IntakeFieldType,

    /// Optional description used for documentation only.
    #[serde(default)]
    pub description: Option<String>,

    /// Whether the input must be supplied. Defaults to required.
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// A manifest paired with its logic payload, as returned by a loader.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    /// Parsed manifest for the model.
    pub manifest: ModelManifest,
    /// Source text of the logic payload, consumed once per sandbox call.
    pub logic: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_parses_with_typed_inputs() {
        let document = r#"
id: "double"
name: "Doubler"
inputs:
  value:
    type: number
  label:
    type: string
    required: false
"#;
        let manifest: ModelManifest = serde_yaml::from_str(document).expect("parse manifest");
        assert_eq!(manifest.id, "double");
        assert_eq!(manifest.inputs["value"].input_type, IntakeFieldType::Number);
        assert!(manifest.inputs["value"].required);
        assert!(!manifest.inputs["label"].required);
    }
}

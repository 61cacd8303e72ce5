//! # Playbook Definitions
//!
//! Data structures describing an authored playbook: the intake schema a run
//! must satisfy and the ordered list of model invocations ("steps") to
//! perform. These structures are deserialized from YAML or JSON documents and
//! are immutable once loaded; the orchestrator only ever reads them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Complete specification for a single playbook.
///
/// A playbook names the models to run, the order to run them in, and the
/// intake fields a caller must supply. Step declaration order is execution
/// order; later steps may derive their inputs from the same intake fields.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlaybookSpec {
    /// Stable identifier used to resolve the playbook document.
    pub id: String,

    /// Document version, echoed verbatim into every report.
    pub version: String,

    /// Optional human-readable description.
    #[serde(default)]
    pub description: Option<String>,

    /// Declared intake fields, keyed by field id.
    ///
    /// Every run is validated against this schema (presence plus primitive
    /// type) before the first step executes.
    #[serde(default)]
    pub intake: IndexMap<String, IntakeFieldSpec>,

    /// Ordered sequence of steps to execute.
    #[serde(default)]
    pub steps: Vec<StepSpec>,
}

/// Declaration of a single intake field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeFieldSpec {
    /// Primitive type the supplied value must have.
    #[serde(rename = "type")]
    pub field_type: IntakeFieldType,

    /// Optional description used for documentation only.
    #[serde(default)]
    pub description: Option<String>,

    /// Whether the field must be present. Defaults to required.
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// Primitive intake field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntakeFieldType {
    Number,
    String,
    Boolean,
}

impl IntakeFieldType {
    /// Returns true when `value` carries this primitive type.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            IntakeFieldType::Number => value.is_number(),
            IntakeFieldType::String => value.is_string(),
            IntakeFieldType::Boolean => value.is_boolean(),
        }
    }

    /// Lowercase name used in validation messages.
    pub fn name(&self) -> &'static str {
        match self {
            IntakeFieldType::Number => "number",
            IntakeFieldType::String => "string",
            IntakeFieldType::Boolean => "boolean",
        }
    }
}

/// Specification for a single playbook step.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StepSpec {
    /// Unique identifier for the step within the playbook.
    pub id: String,

    /// Identifier of the model this step invokes.
    pub model: String,

    /// Optional run condition.
    ///
    /// A single comparison over intake fields (for example
    /// `intake.age > 65`). When it evaluates false the step is skipped;
    /// when absent the step always runs.
    #[serde(default)]
    pub when: Option<String>,

    /// Input bindings, keyed by the model input id they populate.
    #[serde(default)]
    pub inputs: IndexMap<String, InputBinding>,

    /// Failure-propagation policy for this step.
    #[serde(default)]
    pub on_error: OnErrorPolicy,
}

/// One entry of a step's input map.
///
/// Three binding kinds are supported: a literal scalar passed through
/// unchanged, a field-reference string (`"intake.salary"`) looked up in the
/// run's intake values, or a derived expression evaluated over intake fields.
/// The untagged representation lets playbook authors write the natural YAML
/// for each kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputBinding {
    /// `{ derived: "intake.salary + 5000" }`
    Derived {
        /// Arithmetic expression over intake fields.
        derived: String,
    },
    /// Either a field-reference string or a literal scalar; the resolver
    /// distinguishes the two by the reserved `intake.` prefix.
    Value(Value),
}

/// Failure-propagation policy for a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OnErrorPolicy {
    /// Record the failure into the step record and continue with the next
    /// step. This is the default.
    #[default]
    WarnAndContinue,
    /// Stop the run immediately; no later step executes or is recorded.
    Abort,
}

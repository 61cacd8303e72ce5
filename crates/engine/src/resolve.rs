//! Step input resolution.
//!
//! Turns a step's declared input bindings into the concrete values handed to
//! a model: literals pass through, `intake.`-prefixed strings are looked up
//! in the run's intake values, and `{ derived: ... }` objects are evaluated
//! with the arithmetic interpreter. Resolution always produces a fresh map
//! and never mutates the intake values.

use indexmap::IndexMap;
use serde_json::{Map, Number, Value};
use tally_types::{EngineError, ExpressionError, InputBinding};

use crate::expr::evaluate_expression;

/// Reserved prefix marking a field-reference string.
const FIELD_PREFIX: &str = "intake.";

/// Resolves a step's input bindings against intake values.
///
/// A missing intake field, whether referenced directly or from inside a
/// derived expression, is a hard error; inputs never silently default.
pub fn resolve_step_inputs(
    bindings: &IndexMap<String, InputBinding>,
    intake: &Map<String, Value>,
) -> Result<Map<String, Value>, EngineError> {
    let mut resolved = Map::new();
    for (input_id, binding) in bindings {
        let value = match binding {
            InputBinding::Derived { derived } => {
                let number = evaluate_expression(derived, intake)?;
                Value::Number(Number::from_f64(number).ok_or(ExpressionError::NonFiniteResult)?)
            }
            InputBinding::Value(Value::String(text)) if text.starts_with(FIELD_PREFIX) => {
                let field = &text[FIELD_PREFIX.len()..];
                intake
                    .get(field)
                    .cloned()
                    .ok_or_else(|| ExpressionError::UnknownField(field.to_string()))?
            }
            InputBinding::Value(literal) => literal.clone(),
        };
        resolved.insert(input_id.clone(), value);
    }
    Ok(resolved)
}

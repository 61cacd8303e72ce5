//! Evaluation of parsed arithmetic trees against intake values.

use serde_json::{Map, Value};
use tally_types::ExpressionError;

use super::parse::{BinaryOp, Expr};

/// Evaluates a parsed tree against read-only intake values.
///
/// Field references must name a supplied intake field holding a finite
/// number; anything else fails with the field's name. Division by zero and
/// non-finite intermediate results fail outright rather than producing
/// `Infinity` or `NaN`.
pub fn evaluate(expr: &Expr, intake: &Map<String, Value>) -> Result<f64, ExpressionError> {
    match expr {
        Expr::Number(value) => Ok(*value),
        Expr::Field(name) => resolve_field(name, intake),
        Expr::Negate(operand) => Ok(-evaluate(operand, intake)?),
        Expr::Binary { op, left, right } => {
            let left_value = evaluate(left, intake)?;
            let right_value = evaluate(right, intake)?;
            let result = match op {
                BinaryOp::Add => left_value + right_value,
                BinaryOp::Subtract => left_value - right_value,
                BinaryOp::Multiply => left_value * right_value,
                BinaryOp::Divide => {
                    if right_value == 0.0 {
                        return Err(ExpressionError::DivisionByZero);
                    }
                    left_value / right_value
                }
            };
            if !result.is_finite() {
                return Err(ExpressionError::NonFiniteResult);
            }
            Ok(result)
        }
    }
}

fn resolve_field(name: &str, intake: &Map<String, Value>) -> Result<f64, ExpressionError> {
    let value = intake.get(name).ok_or_else(|| ExpressionError::UnknownField(name.to_string()))?;
    let number = value.as_f64().ok_or_else(|| ExpressionError::NonNumericField(name.to_string()))?;
    if !number.is_finite() {
        return Err(ExpressionError::NonNumericField(name.to_string()));
    }
    Ok(number)
}

//! Step run-condition evaluation.
//!
//! Conditions are a deliberately tiny grammar: one comparison `A <op> B`
//! where each side is a numeric literal or an `intake.` field reference, and
//! `op` is one of `==`, `!=`, `>`, `>=`, `<`, `<=`. The literals `true` and
//! `false` pass through unparsed. Conditions are authored by trusted
//! playbook authors, so anything outside this shape fails loudly instead of
//! falling back to a default.
//!
//! Equality is strict: both operands must carry the same primitive type or
//! evaluation fails with a type-mismatch error.

use serde_json::{Map, Value};
use tally_types::ExpressionError;

/// Supported comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

/// Two-character operators first so `>=` is never split into `>` and `=`.
const OPERATORS: [(&str, CompareOp); 6] = [
    ("==", CompareOp::Eq),
    ("!=", CompareOp::Ne),
    (">=", CompareOp::Ge),
    ("<=", CompareOp::Le),
    (">", CompareOp::Gt),
    ("<", CompareOp::Lt),
];

/// One resolved side of a comparison.
#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Number(f64),
    Text(String),
    Flag(bool),
}

impl Operand {
    fn type_name(&self) -> &'static str {
        match self {
            Operand::Number(_) => "number",
            Operand::Text(_) => "string",
            Operand::Flag(_) => "boolean",
        }
    }
}

/// Evaluates a condition against read-only intake values.
pub fn evaluate_condition(text: &str, intake: &Map<String, Value>) -> Result<bool, ExpressionError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(malformed(text, "condition is empty"));
    }

    // Boolean literals pass through unparsed.
    match trimmed {
        "true" => return Ok(true),
        "false" => return Ok(false),
        _ => {}
    }

    let (position, symbol, op) = find_operator(trimmed).ok_or_else(|| malformed(text, "expected a single comparison"))?;
    let left_text = trimmed[..position].trim();
    let right_text = trimmed[position + symbol.len()..].trim();
    if left_text.is_empty() || right_text.is_empty() {
        return Err(malformed(text, "comparison is missing an operand"));
    }
    if find_operator(right_text).is_some() {
        return Err(malformed(text, "more than one comparison operator"));
    }

    let left = resolve_operand(trimmed, left_text, intake)?;
    let right = resolve_operand(trimmed, right_text, intake)?;
    compare(trimmed, op, left, right)
}

fn find_operator(text: &str) -> Option<(usize, &'static str, CompareOp)> {
    for (index, _) in text.char_indices() {
        for (symbol, op) in OPERATORS {
            if text[index..].starts_with(symbol) {
                return Some((index, symbol, op));
            }
        }
    }
    None
}

fn resolve_operand(condition: &str, text: &str, intake: &Map<String, Value>) -> Result<Operand, ExpressionError> {
    if let Some(field) = text.strip_prefix("intake.") {
        if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(malformed(condition, &format!("invalid field reference '{text}'")));
        }
        let value = intake.get(field).ok_or_else(|| ExpressionError::UnknownField(field.to_string()))?;
        return match value {
            Value::Number(_) => {
                let number = value.as_f64().filter(|n| n.is_finite());
                number
                    .map(Operand::Number)
                    .ok_or_else(|| ExpressionError::NonNumericField(field.to_string()))
            }
            Value::String(s) => Ok(Operand::Text(s.clone())),
            Value::Bool(b) => Ok(Operand::Flag(*b)),
            _ => Err(ExpressionError::NonNumericField(field.to_string())),
        };
    }

    let number: f64 = text
        .parse()
        .map_err(|_| malformed(condition, &format!("operand '{text}' is neither a numeric literal nor an intake reference")))?;
    if !number.is_finite() {
        return Err(malformed(condition, &format!("operand '{text}' is not finite")));
    }
    Ok(Operand::Number(number))
}

fn compare(condition: &str, op: CompareOp, left: Operand, right: Operand) -> Result<bool, ExpressionError> {
    match op {
        CompareOp::Eq | CompareOp::Ne => {
            if std::mem::discriminant(&left) != std::mem::discriminant(&right) {
                return Err(ExpressionError::ComparisonTypeMismatch {
                    left: left.type_name().into(),
                    right: right.type_name().into(),
                });
            }
            let equal = left == right;
            Ok(if op == CompareOp::Eq { equal } else { !equal })
        }
        CompareOp::Gt | CompareOp::Ge | CompareOp::Lt | CompareOp::Le => {
            let (Operand::Number(l), Operand::Number(r)) = (&left, &right) else {
                return Err(malformed(condition, "ordering comparisons require numeric operands"));
            };
            Ok(match op {
                CompareOp::Gt => l > r,
                CompareOp::Ge => l >= r,
                CompareOp::Lt => l < r,
                CompareOp::Le => l <= r,
                _ => unreachable!(),
            })
        }
    }
}

fn malformed(condition: &str, detail: &str) -> ExpressionError {
    ExpressionError::MalformedCondition {
        condition: condition.trim().to_string(),
        detail: detail.to_string(),
    }
}

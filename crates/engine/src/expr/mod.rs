//! Hand-written arithmetic expression interpreter.
//!
//! Playbook authors derive step inputs from intake fields with small
//! arithmetic expressions (`intake.salary + 5000`). The grammar is
//! implemented as an enum-tagged token stream feeding a recursive-descent
//! parser with one token of lookahead:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := factor (('*' | '/') factor)*
//! factor := NUMBER | FIELD_REF | '(' expr ')' | '-' factor
//! ```
//!
//! There is deliberately no dynamic-evaluation shortcut anywhere in this
//! pipeline; accepting author-supplied text must not reopen the capability
//! the sandbox exists to remove. Parsing and evaluation are pure functions
//! of their arguments: fresh tokens and a fresh tree per call.

mod eval;
mod parse;
mod token;

pub use eval::evaluate;
pub use parse::{BinaryOp, Expr, parse};
pub use token::{Token, TokenKind, tokenize};

use serde_json::{Map, Value};
use tally_types::ExpressionError;

/// Parses and evaluates an arithmetic expression against intake values.
pub fn evaluate_expression(text: &str, intake: &Map<String, Value>) -> Result<f64, ExpressionError> {
    let tree = parse(text)?;
    evaluate(&tree, intake)
}

#[cfg(test)]
mod tests {
    use super::evaluate_expression;
    use serde_json::{Map, Value, json};
    use tally_types::ExpressionError;

    fn intake(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs.iter().map(|(key, value)| (key.to_string(), value.clone())).collect()
    }

    #[test]
    fn precedence_and_associativity_are_standard() {
        let empty = Map::new();
        assert_eq!(evaluate_expression("2 + 3 * 4", &empty).expect("eval"), 14.0);
        assert_eq!(evaluate_expression("(2 + 3) * 4", &empty).expect("eval"), 20.0);
        assert_eq!(evaluate_expression("20 - 6 - 4", &empty).expect("eval"), 10.0);
        assert_eq!(evaluate_expression("24 / 4 / 2", &empty).expect("eval"), 3.0);
        assert_eq!(evaluate_expression("-3 * -2", &empty).expect("eval"), 6.0);
        assert_eq!(evaluate_expression(".5 * 8", &empty).expect("eval"), 4.0);
    }

    #[test]
    fn field_references_resolve_against_intake() {
        let intake = intake(&[("salary", json!(50000)), ("bonus", json!(0.1))]);
        assert_eq!(evaluate_expression("intake.salary + 5000", &intake).expect("eval"), 55000.0);
        assert_eq!(
            evaluate_expression("intake.salary * intake.bonus", &intake).expect("eval"),
            5000.0
        );
    }

    #[test]
    fn unknown_field_fails_with_the_field_name() {
        let intake = intake(&[("salary", json!(50000))]);
        let error = evaluate_expression("intake.salery + 1", &intake).expect_err("unknown field");
        assert_eq!(error, ExpressionError::UnknownField("salery".into()));
    }

    #[test]
    fn non_numeric_field_fails_with_the_field_name() {
        let intake = intake(&[("name", json!("Ada"))]);
        let error = evaluate_expression("intake.name * 2", &intake).expect_err("non-numeric");
        assert_eq!(error, ExpressionError::NonNumericField("name".into()));
    }

    #[test]
    fn division_by_zero_fails_in_any_subexpression() {
        let empty = Map::new();
        assert_eq!(
            evaluate_expression("1 / 0", &empty).expect_err("div by zero"),
            ExpressionError::DivisionByZero
        );
        assert_eq!(
            evaluate_expression("5 + 3 * (2 / (1 - 1))", &empty).expect_err("nested div by zero"),
            ExpressionError::DivisionByZero
        );
    }

    #[test]
    fn stray_characters_fail_with_their_position() {
        let empty = Map::new();
        let error = evaluate_expression("1 + $2", &empty).expect_err("stray character");
        assert_eq!(
            error,
            ExpressionError::UnexpectedCharacter {
                character: '$',
                position: 4
            }
        );
    }
}

//! # Isolated Executor
//!
//! Runs one logic payload against validated inputs inside a disposable,
//! capability-restricted interpreter. The boundary is structural: payload
//! text is interpreted by [`script`] and [`eval`], which have no host
//! dynamic-evaluation facility to escape into, and the execution context
//! exposes only an explicit allow-list while pre-binding every known escape
//! name to an inert marker.
//!
//! Execution is two-phase. Phase 1 runs the payload's top-level statements
//! so it can register its `compute { ... }` entry point; phase 2 invokes the
//! registered body with the frozen inputs. Each phase gets its own
//! wall-clock budget, and exceeding it is a distinct timeout failure rather
//! than a generic error. A context is never reused: state a payload binds
//! in one invocation is unobservable from the next.

mod eval;
mod script;
mod value;

pub use eval::{BLOCKED_BINDINGS, ExecutionContext, LOG_TARGET};
pub use script::{Program, parse_payload};
pub use value::Value;

use std::time::{Duration, Instant};

use indexmap::IndexMap;
use serde_json::{Map, Value as Json};
use tally_types::EngineError;
use tracing::debug;

use script::{Stmt, TopLevel};

/// Default wall-clock budget per phase.
pub const DEFAULT_BUDGET: Duration = Duration::from_millis(5000);

/// Isolated executor for logic payloads.
#[derive(Debug, Clone)]
pub struct Sandbox {
    budget: Duration,
}

impl Default for Sandbox {
    fn default() -> Self {
        Sandbox { budget: DEFAULT_BUDGET }
    }
}

impl Sandbox {
    /// Sandbox with the default 5000 ms per-phase budget.
    pub fn new() -> Self {
        Sandbox::default()
    }

    /// Sandbox with a caller-chosen per-phase budget.
    pub fn with_budget(budget: Duration) -> Self {
        Sandbox { budget }
    }

    /// The per-phase wall-clock budget this sandbox enforces.
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Executes a payload against inputs, returning its output mapping.
    ///
    /// Contract checks come first: blank payload text or non-mapping inputs
    /// are programmer errors raised before any isolation work. The sandbox
    /// never retries; callers own retry policy.
    pub fn execute(&self, payload: &str, inputs: &Json) -> Result<Map<String, Json>, EngineError> {
        if payload.trim().is_empty() {
            return Err(EngineError::Contract("logic payload must be non-empty text".into()));
        }
        let Json::Object(input_entries) = inputs else {
            return Err(EngineError::Contract(format!(
                "sandbox inputs must be a mapping, got {}",
                json_type_name(inputs)
            )));
        };

        let budget_ms = self.budget.as_millis().min(u64::MAX as u128) as u64;
        let program = parse_payload(payload).map_err(|detail| EngineError::Sandbox(format!("payload parse error: {detail}")))?;

        // Phase 1: run top-level statements; the payload registers its entry
        // point here. Inputs are deliberately not bound yet.
        let mut registration = ExecutionContext::root(Instant::now() + self.budget, budget_ms);
        let mut entry: Option<Vec<Stmt>> = None;
        for item in &program.items {
            match item {
                TopLevel::Let { name, expr } => {
                    let value = registration.eval(expr)?;
                    registration.bind(name, value)?;
                }
                TopLevel::Compute(body) => {
                    if entry.is_some() {
                        return Err(EngineError::Sandbox("payload registered more than one computation".into()));
                    }
                    entry = Some(body.clone());
                }
            }
        }
        let entry = entry.ok_or_else(|| EngineError::Sandbox("payload did not register a computation entry point".into()))?;
        debug!(statements = entry.len(), "payload registered its computation");

        // Freeze inputs before injection; the interpreter only ever hands
        // out clones, so the payload cannot mutate what the caller supplied.
        let mut frozen = IndexMap::new();
        for (field, json) in input_entries {
            frozen.insert(field.clone(), Value::from_json(json).map_err(EngineError::Sandbox)?);
        }

        // Phase 2: invoke the entry point under a fresh budget, in the
        // narrowed context carrying only phase-1 bindings plus the inputs.
        let mut invocation = registration.narrowed(frozen, Instant::now() + self.budget);
        let returned = invocation
            .run_block(&entry)?
            .ok_or_else(|| EngineError::Sandbox("computation finished without returning a value".into()))?;

        match returned {
            Value::Map(entries) => {
                let mut outputs = Map::new();
                for (key, value) in entries {
                    outputs.insert(key, value.into_json().map_err(EngineError::Sandbox)?);
                }
                Ok(outputs)
            }
            other => Err(EngineError::Sandbox(format!(
                "computation must return a mapping, got {}",
                other.type_name()
            ))),
        }
    }
}

fn json_type_name(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tally_types::SandboxPhase;

    const DOUBLE_PAYLOAD: &str = r#"
let factor = 2

compute {
  return { "doubled": inputs.value * factor }
}
"#;

    #[test]
    fn executes_a_simple_model() {
        let sandbox = Sandbox::new();
        let outputs = sandbox.execute(DOUBLE_PAYLOAD, &json!({"value": 50000})).expect("execute");
        assert_eq!(outputs["doubled"], json!(100000));
    }

    #[test]
    fn rejects_blank_payloads_and_non_mapping_inputs_before_isolation() {
        let sandbox = Sandbox::new();
        assert!(matches!(
            sandbox.execute("   \n", &json!({})).expect_err("blank payload"),
            EngineError::Contract(_)
        ));
        assert!(matches!(
            sandbox.execute(DOUBLE_PAYLOAD, &json!([1, 2])).expect_err("array inputs"),
            EngineError::Contract(_)
        ));
        assert!(matches!(
            sandbox.execute(DOUBLE_PAYLOAD, &json!(null)).expect_err("null inputs"),
            EngineError::Contract(_)
        ));
    }

    #[test]
    fn payload_without_entry_point_fails() {
        let sandbox = Sandbox::new();
        let error = sandbox.execute("let a = 1", &json!({})).expect_err("no compute block");
        assert!(error.to_string().contains("did not register"));
    }

    #[test]
    fn non_mapping_return_is_an_execution_error() {
        let sandbox = Sandbox::new();
        let error = sandbox
            .execute("compute { return 42 }", &json!({}))
            .expect_err("scalar return");
        assert!(matches!(error, EngineError::Sandbox(_)));
        assert!(error.to_string().contains("must return a mapping"));

        let error = sandbox
            .execute("compute { return null }", &json!({}))
            .expect_err("null return");
        assert!(error.to_string().contains("must return a mapping"));
    }

    #[test]
    fn consecutive_invocations_share_no_state() {
        let sandbox = Sandbox::new();

        // First payload stashes a value in a top-level binding.
        let stash = r#"
let stash = 99
compute { return { "stash": stash } }
"#;
        let outputs = sandbox.execute(stash, &json!({})).expect("first invocation");
        assert_eq!(outputs["stash"], json!(99));

        // A second payload cannot observe it; the context was destroyed.
        let probe = r#"compute { return { "seen": stash } }"#;
        let error = sandbox.execute(probe, &json!({})).expect_err("second invocation");
        assert!(error.to_string().contains("unknown binding 'stash'"));
    }

    #[test]
    fn blocked_capabilities_fail_loudly_from_payload_code() {
        let sandbox = Sandbox::new();
        let attempts = [
            r#"compute { return { "env": env } }"#,
            r#"compute { return { "spawned": spawn("sh") } }"#,
            r#"compute { let e = eval
  return { "e": e } }"#,
            r#"compute { return { "t": set_timeout(0) } }"#,
            r#"compute { return { "g": global } }"#,
            r#"compute { return { "b": buffer } }"#,
            r#"compute { return { "n": fetch("http://example.com") } }"#,
        ];
        for payload in attempts {
            let error = sandbox.execute(payload, &json!({})).expect_err("escape attempt");
            assert!(
                error.to_string().contains("blocked capability"),
                "payload {payload:?} produced: {error}"
            );
        }
    }

    #[test]
    fn deeply_nested_payload_fails_instead_of_crashing_the_host() {
        // A long unary-minus chain drives the parser's recursion; it must
        // come back as a sandbox error, never take down the process.
        let payload = format!("compute {{ return {{ \"x\": {}1 }} }}", "-".repeat(200_000));
        let sandbox = Sandbox::new();
        let error = sandbox.execute(&payload, &json!({})).expect_err("deep nesting");
        assert!(matches!(error, EngineError::Sandbox(_)));
        assert!(error.to_string().contains("nesting"), "got: {error}");
    }

    #[test]
    fn runaway_payload_times_out_with_the_distinct_failure() {
        let sandbox = Sandbox::with_budget(Duration::from_millis(20));
        let runaway = r#"
compute {
  let x = 0
  repeat 100000000 {
    let x = x + 1
  }
  return { "x": x }
}
"#;
        let error = sandbox.execute(runaway, &json!({})).expect_err("timeout");
        assert!(matches!(
            error,
            EngineError::SandboxTimeout {
                phase: SandboxPhase::Invoke,
                budget_ms: 20
            }
        ));
    }

    #[test]
    fn compound_interest_runs_with_decimal_precision() {
        let payload = r#"
compute {
  let balance = inputs.principal
  repeat inputs.periods {
    let balance = balance * (1 + inputs.rate)
  }
  return { "balance": round(balance, 2) }
}
"#;
        let sandbox = Sandbox::new();
        let outputs = sandbox
            .execute(payload, &json!({"principal": 1000, "rate": 0.05, "periods": 3}))
            .expect("execute");
        // 1000 * 1.05^3 = 1157.625, rounded half-even to 2 places.
        assert_eq!(outputs["balance"], json!(1157.62));
    }

    #[test]
    fn inputs_are_not_mutated_by_execution() {
        let inputs = json!({"value": 10});
        let before = inputs.clone();
        let sandbox = Sandbox::new();
        sandbox.execute(DOUBLE_PAYLOAD, &inputs).expect("execute");
        assert_eq!(inputs, before);
    }
}

//! Execution context and interpreter for payload programs.
//!
//! The context is the security boundary: it starts from an explicit
//! allow-list (arithmetic, decimal numbers, a JSON codec, `now`, the log
//! sink) and pre-binds every known host-escape name to an inert
//! [`Value::Blocked`] marker, so an escape attempt fails on lookup instead
//! of falling through to an ambient global. The interpreter checks its
//! wall-clock deadline at every statement and expression node; that is the
//! cooperative yield point enforcing the invocation budget.

use std::collections::HashMap;
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use rust_decimal::prelude::ToPrimitive;
use tally_types::{EngineError, SandboxPhase};
use tracing::info;

use super::script::{ArithOp, ScriptExpr, Stmt};
use super::value::Value;

/// Tracing target for the payload log sink.
pub const LOG_TARGET: &str = "tally::sandbox";

/// Deepest expression/block nesting the interpreter will walk. The parser
/// applies its own bound, so this one only fires on trees built some other
/// way, but the evaluator must not rely on its caller for stack safety.
const MAX_NESTING_DEPTH: usize = 256;

/// Every known escape vector, bound to an inert value rather than omitted so
/// an ambient-lookup leak cannot resolve one of these names to anything
/// usable: dynamic code loading, process and environment introspection,
/// global handles, timers, raw buffers, and network primitives.
pub const BLOCKED_BINDINGS: &[&str] = &[
    "eval",
    "exec",
    "compile",
    "require",
    "import",
    "load",
    "spawn",
    "system",
    "shell",
    "process",
    "env",
    "environ",
    "open",
    "read_file",
    "write_file",
    "file",
    "socket",
    "connect",
    "fetch",
    "http",
    "buffer",
    "alloc",
    "timer",
    "sleep",
    "set_timeout",
    "set_interval",
    "global",
    "globals",
    "this",
];

type Builtin = fn(&[Value]) -> Result<Value, String>;

/// Allow-listed functions callable from payload code.
static BUILTINS: Lazy<HashMap<&'static str, Builtin>> = Lazy::new(|| {
    let mut table: HashMap<&'static str, Builtin> = HashMap::new();
    table.insert("min", builtin_min);
    table.insert("max", builtin_max);
    table.insert("abs", builtin_abs);
    table.insert("round", builtin_round);
    table.insert("encode", builtin_encode);
    table.insert("decode", builtin_decode);
    table.insert("now", builtin_now);
    table
});

/// Disposable namespace for one sandbox phase.
///
/// Created fresh per invocation and dropped afterwards; nothing a payload
/// binds here survives into the next invocation.
pub struct ExecutionContext {
    bindings: IndexMap<String, Value>,
    /// Frozen inputs; `None` during registration, when payload code may not
    /// read them yet.
    inputs: Option<IndexMap<String, Value>>,
    deadline: Instant,
    phase: SandboxPhase,
    budget_ms: u64,
    depth: usize,
}

impl ExecutionContext {
    /// Root context for phase 1: allow-list plus blocked markers, no inputs.
    pub fn root(deadline: Instant, budget_ms: u64) -> Self {
        let mut bindings = IndexMap::new();
        for name in BLOCKED_BINDINGS {
            bindings.insert((*name).to_string(), Value::Blocked(name));
        }
        ExecutionContext {
            bindings,
            inputs: None,
            deadline,
            phase: SandboxPhase::Register,
            budget_ms,
            depth: 0,
        }
    }

    /// Narrows a registration context into the phase-2 invocation context:
    /// same allow-list and phase-1 bindings, plus the frozen inputs, under a
    /// fresh deadline.
    pub fn narrowed(self, inputs: IndexMap<String, Value>, deadline: Instant) -> Self {
        ExecutionContext {
            bindings: self.bindings,
            inputs: Some(inputs),
            deadline,
            phase: SandboxPhase::Invoke,
            budget_ms: self.budget_ms,
            depth: 0,
        }
    }

    /// Binds a payload-defined name, refusing to shadow reserved names.
    pub fn bind(&mut self, name: &str, value: Value) -> Result<(), EngineError> {
        if BLOCKED_BINDINGS.contains(&name) || name == "inputs" {
            return Err(EngineError::Sandbox(format!("cannot rebind reserved name '{name}'")));
        }
        self.bindings.insert(name.to_string(), value);
        Ok(())
    }

    fn check_deadline(&self) -> Result<(), EngineError> {
        if Instant::now() >= self.deadline {
            return Err(EngineError::SandboxTimeout {
                phase: self.phase,
                budget_ms: self.budget_ms,
            });
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<Value, EngineError> {
        match self.bindings.get(name) {
            Some(Value::Blocked(blocked)) => Err(blocked_error(blocked)),
            Some(value) => Ok(value.clone()),
            None => Err(EngineError::Sandbox(format!("unknown binding '{name}'"))),
        }
    }

    fn descend(&mut self) -> Result<(), EngineError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            self.depth -= 1;
            return Err(EngineError::Sandbox(format!(
                "payload nesting exceeds {MAX_NESTING_DEPTH} levels"
            )));
        }
        Ok(())
    }

    /// Evaluates one expression node.
    pub fn eval(&mut self, expr: &ScriptExpr) -> Result<Value, EngineError> {
        self.check_deadline()?;
        self.descend()?;
        let result = self.eval_node(expr);
        self.depth -= 1;
        result
    }

    fn eval_node(&mut self, expr: &ScriptExpr) -> Result<Value, EngineError> {
        match expr {
            ScriptExpr::Literal(value) => Ok(value.clone()),
            ScriptExpr::Ident(name) => self.lookup(name),
            ScriptExpr::Input(field) => {
                let inputs = self
                    .inputs
                    .as_ref()
                    .ok_or_else(|| EngineError::Sandbox("inputs are only available inside the computation".into()))?;
                inputs
                    .get(field)
                    .cloned()
                    .ok_or_else(|| EngineError::Sandbox(format!("unknown input '{field}'")))
            }
            ScriptExpr::Call { name, args } => {
                if BLOCKED_BINDINGS.contains(&name.as_str()) {
                    return Err(blocked_error(name));
                }
                let callee = BUILTINS
                    .get(name.as_str())
                    .copied()
                    .ok_or_else(|| EngineError::Sandbox(format!("unknown function '{name}'")))?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg)?);
                }
                callee(&values).map_err(EngineError::Sandbox)
            }
            ScriptExpr::Negate(operand) => match self.eval(operand)? {
                Value::Number(decimal) => Ok(Value::Number(-decimal)),
                other => Err(EngineError::Sandbox(format!("cannot negate a {}", other.type_name()))),
            },
            ScriptExpr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                apply_arithmetic(*op, left, right)
            }
            ScriptExpr::ListLit(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item)?);
                }
                Ok(Value::List(values))
            }
            ScriptExpr::MapLit(entries) => {
                let mut map = IndexMap::new();
                for (key, value_expr) in entries {
                    let value = self.eval(value_expr)?;
                    map.insert(key.clone(), value);
                }
                Ok(Value::Map(map))
            }
        }
    }

    /// Runs a statement block; `Some(value)` means a `return` fired.
    pub fn run_block(&mut self, body: &[Stmt]) -> Result<Option<Value>, EngineError> {
        self.descend()?;
        let result = self.run_statements(body);
        self.depth -= 1;
        result
    }

    fn run_statements(&mut self, body: &[Stmt]) -> Result<Option<Value>, EngineError> {
        for statement in body {
            self.check_deadline()?;
            match statement {
                Stmt::Let { name, expr } => {
                    let value = self.eval(expr)?;
                    self.bind(name, value)?;
                }
                Stmt::Log(expr) => {
                    let value = self.eval(expr)?;
                    info!(target: LOG_TARGET, "{}", value.render());
                }
                Stmt::Return(expr) => {
                    let value = self.eval(expr)?;
                    return Ok(Some(value));
                }
                Stmt::Repeat { count, body } => {
                    let iterations = match self.eval(count)? {
                        Value::Number(decimal) if decimal.fract().is_zero() && !decimal.is_sign_negative() => decimal
                            .to_u64()
                            .ok_or_else(|| EngineError::Sandbox(format!("repeat count {decimal} is out of range")))?,
                        other => {
                            return Err(EngineError::Sandbox(format!(
                                "repeat count must be a whole non-negative number, got {}",
                                other.type_name()
                            )));
                        }
                    };
                    for _ in 0..iterations {
                        self.check_deadline()?;
                        if let Some(returned) = self.run_block(body)? {
                            return Ok(Some(returned));
                        }
                    }
                }
            }
        }
        Ok(None)
    }
}

fn blocked_error(name: &str) -> EngineError {
    EngineError::Sandbox(format!("blocked capability '{name}' is not available inside the sandbox"))
}

fn apply_arithmetic(op: ArithOp, left: Value, right: Value) -> Result<Value, EngineError> {
    let (Value::Number(l), Value::Number(r)) = (&left, &right) else {
        return Err(EngineError::Sandbox(format!(
            "arithmetic requires numbers, got {} and {}",
            left.type_name(),
            right.type_name()
        )));
    };
    let result = match op {
        ArithOp::Add => l.checked_add(*r),
        ArithOp::Sub => l.checked_sub(*r),
        ArithOp::Mul => l.checked_mul(*r),
        ArithOp::Div => {
            if r.is_zero() {
                return Err(EngineError::Sandbox("division by zero".into()));
            }
            l.checked_div(*r)
        }
    };
    result
        .map(Value::Number)
        .ok_or_else(|| EngineError::Sandbox("arithmetic overflow".into()))
}

fn builtin_min(args: &[Value]) -> Result<Value, String> {
    let (a, b) = two_numbers("min", args)?;
    Ok(Value::Number(a.min(b)))
}

fn builtin_max(args: &[Value]) -> Result<Value, String> {
    let (a, b) = two_numbers("max", args)?;
    Ok(Value::Number(a.max(b)))
}

fn builtin_abs(args: &[Value]) -> Result<Value, String> {
    match args {
        [Value::Number(decimal)] => Ok(Value::Number(decimal.abs())),
        _ => Err("abs expects one number".into()),
    }
}

/// `round(x)` rounds to a whole number; `round(x, n)` keeps `n` decimal
/// places. Uses banker's rounding, matching the decimal library default.
fn builtin_round(args: &[Value]) -> Result<Value, String> {
    match args {
        [Value::Number(decimal)] => Ok(Value::Number(decimal.round())),
        [Value::Number(decimal), Value::Number(places)] if places.fract().is_zero() => {
            let digits = places.to_u32().ok_or("round places out of range")?;
            Ok(Value::Number(decimal.round_dp(digits)))
        }
        _ => Err("round expects a number and an optional whole number of places".into()),
    }
}

fn builtin_encode(args: &[Value]) -> Result<Value, String> {
    match args {
        [value] => {
            let json = value.clone().into_json()?;
            Ok(Value::Str(json.to_string()))
        }
        _ => Err("encode expects one value".into()),
    }
}

fn builtin_decode(args: &[Value]) -> Result<Value, String> {
    match args {
        [Value::Str(text)] => {
            let json: serde_json::Value = serde_json::from_str(text).map_err(|error| format!("decode: {error}"))?;
            Value::from_json(&json)
        }
        _ => Err("decode expects one string".into()),
    }
}

fn builtin_now(args: &[Value]) -> Result<Value, String> {
    if !args.is_empty() {
        return Err("now expects no arguments".into());
    }
    Ok(Value::Str(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)))
}

fn two_numbers(name: &str, args: &[Value]) -> Result<(rust_decimal::Decimal, rust_decimal::Decimal), String> {
    match args {
        [Value::Number(a), Value::Number(b)] => Ok((*a, *b)),
        _ => Err(format!("{name} expects two numbers")),
    }
}

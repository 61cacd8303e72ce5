//! Values handled inside the sandbox interpreter.
//!
//! Numbers are arbitrary-precision decimals so financial payloads never pay
//! binary-float rounding on currency amounts. Conversion to and from JSON
//! happens exactly twice per invocation: inputs are deep-converted (frozen)
//! before phase 2, and the returned mapping is converted back afterwards.

use indexmap::IndexMap;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value as Json;

/// Runtime value inside an execution context.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(Decimal),
    Str(String),
    Bool(bool),
    Null,
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    /// Inert marker bound to every known escape name. Reading or calling a
    /// blocked value always fails; it never behaves like data.
    Blocked(&'static str),
}

impl Value {
    /// Type name used in sandbox error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Bool(_) => "boolean",
            Value::Null => "null",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Blocked(_) => "blocked",
        }
    }

    /// Converts a JSON value into a sandbox value.
    ///
    /// Numbers go through their decimal string form so `0.1` stays `0.1`
    /// instead of the nearest binary double.
    pub fn from_json(json: &Json) -> Result<Value, String> {
        match json {
            Json::Null => Ok(Value::Null),
            Json::Bool(flag) => Ok(Value::Bool(*flag)),
            Json::String(text) => Ok(Value::Str(text.clone())),
            Json::Number(number) => number
                .to_string()
                .parse::<Decimal>()
                .map(Value::Number)
                .map_err(|_| format!("number {number} is outside the sandbox numeric range")),
            Json::Array(items) => items.iter().map(Value::from_json).collect::<Result<Vec<_>, _>>().map(Value::List),
            Json::Object(entries) => {
                let mut map = IndexMap::new();
                for (key, value) in entries {
                    map.insert(key.clone(), Value::from_json(value)?);
                }
                Ok(Value::Map(map))
            }
        }
    }

    /// Converts a sandbox value back into JSON.
    ///
    /// Whole decimals within the `i64` range become JSON integers; everything
    /// else is rendered through `f64`. A blocked marker has no JSON form and
    /// is an error, which keeps blocked bindings out of payload outputs.
    pub fn into_json(self) -> Result<Json, String> {
        match self {
            Value::Null => Ok(Json::Null),
            Value::Bool(flag) => Ok(Json::Bool(flag)),
            Value::Str(text) => Ok(Json::String(text)),
            Value::Number(decimal) => {
                if decimal.fract().is_zero()
                    && let Some(whole) = decimal.to_i64()
                {
                    return Ok(Json::from(whole));
                }
                let float = decimal.to_f64().ok_or_else(|| format!("number {decimal} cannot be represented"))?;
                serde_json::Number::from_f64(float)
                    .map(Json::Number)
                    .ok_or_else(|| format!("number {decimal} cannot be represented"))
            }
            Value::List(items) => items.into_iter().map(Value::into_json).collect::<Result<Vec<_>, _>>().map(Json::Array),
            Value::Map(entries) => {
                let mut object = serde_json::Map::new();
                for (key, value) in entries {
                    object.insert(key, value.into_json()?);
                }
                Ok(Json::Object(object))
            }
            Value::Blocked(name) => Err(format!("blocked capability '{name}' cannot leave the sandbox")),
        }
    }

    /// Renders a value for the log sink.
    pub fn render(&self) -> String {
        match self {
            Value::Number(decimal) => decimal.to_string(),
            Value::Str(text) => text.clone(),
            Value::Bool(flag) => flag.to_string(),
            Value::Null => "null".into(),
            Value::Blocked(name) => format!("<blocked:{name}>"),
            other => other.clone().into_json().map(|json| json.to_string()).unwrap_or_else(|e| e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_round_trip_preserves_decimal_text() {
        let value = Value::from_json(&json!(0.1)).expect("convert");
        assert_eq!(value, Value::Number("0.1".parse().expect("decimal")));
    }

    #[test]
    fn whole_decimals_become_json_integers() {
        let value = Value::Number("100000".parse().expect("decimal"));
        assert_eq!(value.into_json().expect("convert"), json!(100000));
    }

    #[test]
    fn nested_structures_convert_both_ways() {
        let json = json!({"rate": 0.07, "tags": ["a", "b"], "meta": {"active": true, "note": null}});
        let value = Value::from_json(&json).expect("convert");
        assert_eq!(value.into_json().expect("convert back"), json);
    }

    #[test]
    fn blocked_markers_never_serialize() {
        let error = Value::Blocked("process").into_json().expect_err("blocked");
        assert!(error.contains("process"));
    }
}

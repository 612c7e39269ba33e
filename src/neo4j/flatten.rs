//! Property flattening for Neo4j
//!
//! Neo4j properties must be primitives or homogeneous arrays of primitives.
//! Nested objects are flattened to `parent_child` keys and arrays are stored
//! as JSON strings. Metadata keys are prefixed with `metadata_`.

use crate::graph::models::Properties;
use serde_json::Value;

/// Prefix applied to every flattened metadata key
pub const METADATA_PREFIX: &str = "metadata";

/// Flatten one property map into `out`, prefixing keys with `prefix` when given.
/// Null values are dropped.
pub fn flatten_into(out: &mut Properties, prefix: Option<&str>, props: &Properties) {
    for (key, value) in props {
        let key = match prefix {
            Some(p) => format!("{}_{}", p, key),
            None => key.clone(),
        };
        flatten_value(out, key, value);
    }
}

fn flatten_value(out: &mut Properties, key: String, value: &Value) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (child, nested) in map {
                flatten_value(out, format!("{}_{}", key, child), nested);
            }
        }
        Value::Array(_) => {
            out.insert(key, Value::String(value.to_string()));
        }
        // serde_json numbers are always finite; see `finite_number`
        Value::Number(_) | Value::Bool(_) | Value::String(_) => {
            out.insert(key, value.clone());
        }
    }
}

/// Number value for a raw float, `null` when it is not finite
pub fn finite_number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Flattened storage record: properties as-is, metadata under `metadata_`
pub fn flatten_record(properties: &Properties, metadata: &Properties) -> Properties {
    let mut out = Properties::new();
    flatten_into(&mut out, None, properties);
    flatten_into(&mut out, Some(METADATA_PREFIX), metadata);
    out
}

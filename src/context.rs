//! Typed access to untyped request inputs and rule configuration.
//!
//! Request inputs and stored rule configuration both arrive as JSON
//! objects whose shape depends on the selected strategy.  Rather than
//! deserialising them into one rigid struct, the engine keeps them as
//! [`Fields`] and pulls out typed values on demand.  Every accessor
//! returns `None` both when the key is absent and when the value has an
//! unexpected type; callers decide whether that is fatal.

use serde_json::{Map, Value};

/// A string-keyed map of heterogeneous JSON values.
pub type Fields = Map<String, Value>;

/// Extracts a number.  Integers, unsigned integers and floats all
/// coerce, since inputs deserialised from JSON and configuration
/// written by hand may use either representation.
pub fn get_f64(fields: &Fields, key: &str) -> Option<f64> {
    fields.get(key).and_then(as_f64)
}

/// Coerces a single value to `f64` if it is a JSON number.
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

pub fn get_str<'a>(fields: &'a Fields, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(Value::as_str)
}

pub fn get_map<'a>(fields: &'a Fields, key: &str) -> Option<&'a Fields> {
    fields.get(key).and_then(Value::as_object)
}

pub fn get_array<'a>(fields: &'a Fields, key: &str) -> Option<&'a Vec<Value>> {
    fields.get(key).and_then(Value::as_array)
}

pub fn get_bool(fields: &Fields, key: &str) -> Option<bool> {
    fields.get(key).and_then(Value::as_bool)
}

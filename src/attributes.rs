//! Conversion of query parameters into typed span attributes.

use crate::driver::{NamedValue, Value};

/// Upper bound on the size of a single encoded parameter.
pub const MAX_ARG_LEN: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

/// One key/value pair destined for a span.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub key: String,
    pub value: AttributeValue,
}

impl Attribute {
    /// Encode a parameter value under `key`.
    pub fn from_value(key: impl Into<String>, value: &Value) -> Self {
        let value = match value {
            Value::Null => AttributeValue::Str(String::new()),
            Value::Int(v) => AttributeValue::Int(*v),
            Value::Float(v) => AttributeValue::Str(format!("{v:.6}")),
            Value::Bool(v) => AttributeValue::Bool(*v),
            Value::Bytes(v) => {
                let end = v.len().min(MAX_ARG_LEN);
                let mut s = String::from_utf8_lossy(&v[..end]).into_owned();
                s.truncate(floor_char_boundary(&s, MAX_ARG_LEN));
                AttributeValue::Str(s)
            }
            other => AttributeValue::Str(other.to_string().chars().take(MAX_ARG_LEN).collect()),
        };
        Self {
            key: key.into(),
            value,
        }
    }
}

// Lossy decoding may widen a split character, so cut again on a boundary.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    let mut end = s.len().min(max);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}

/// Key used for a parameter without a name.
pub fn ordinal_key(ordinal: usize) -> String {
    format!("sql.arg.{ordinal}")
}

/// Attributes for primitive positional arguments.
pub fn positional_args(args: &[Value]) -> Vec<Attribute> {
    args.iter()
        .enumerate()
        .map(|(i, arg)| Attribute::from_value(ordinal_key(i + 1), arg))
        .collect()
}

/// Attributes for context-aware arguments, keyed by name when present.
pub fn named_args(args: &[NamedValue]) -> Vec<Attribute> {
    args.iter()
        .map(|arg| {
            let key = match &arg.name {
                Some(name) if !name.is_empty() => name.clone(),
                _ => ordinal_key(arg.ordinal),
            };
            Attribute::from_value(key, &arg.value)
        })
        .collect()
}

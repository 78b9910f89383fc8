//! Declared payload shapes.

use serde_json::Value;

/// Target kind of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    /// Any JSON value is accepted; never coerced.
    Any,
}

impl FieldKind {
    /// Human-readable article + noun used in violation messages.
    pub fn describe(self) -> &'static str {
        match self {
            FieldKind::String => "a string",
            FieldKind::Integer => "an integer number",
            FieldKind::Number => "a number",
            FieldKind::Boolean => "a boolean value",
            FieldKind::Array => "an array",
            FieldKind::Object => "an object",
            FieldKind::Any => "any value",
        }
    }

    /// Whether `v` already has this kind.
    pub fn matches(self, v: &Value) -> bool {
        match self {
            FieldKind::String => v.is_string(),
            FieldKind::Integer => v.is_i64() || v.is_u64(),
            FieldKind::Number => v.is_number(),
            FieldKind::Boolean => v.is_boolean(),
            FieldKind::Array => v.is_array(),
            FieldKind::Object => v.is_object(),
            FieldKind::Any => true,
        }
    }

    /// Best-effort conversion of `v` into this kind. Returns `None` when the
    /// value cannot be represented losslessly.
    pub fn coerce(self, v: &Value) -> Option<Value> {
        match (self, v) {
            (FieldKind::String, Value::Number(n)) => Some(Value::String(n.to_string())),
            (FieldKind::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
            (FieldKind::Integer, Value::String(s)) => {
                s.trim().parse::<i64>().ok().map(Value::from)
            }
            (FieldKind::Integer, Value::Number(n)) => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| Value::from(f as i64)),
            (FieldKind::Number, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            (FieldKind::Boolean, Value::String(s)) => match s.trim() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        }
    }
}

/// One declared field of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// A payload type that declares its fields.
///
/// ```
/// use bootwire_core::validation::{FieldKind, FieldSpec, Schema};
///
/// struct CreateUser;
///
/// impl Schema for CreateUser {
///     fn fields() -> &'static [FieldSpec] {
///         const FIELDS: &[FieldSpec] = &[
///             FieldSpec::required("email", FieldKind::String),
///             FieldSpec::optional("age", FieldKind::Integer),
///         ];
///         FIELDS
///     }
/// }
///
/// assert_eq!(CreateUser::fields().len(), 2);
/// ```
pub trait Schema {
    fn fields() -> &'static [FieldSpec];
}

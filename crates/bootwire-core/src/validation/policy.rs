//! Global validation policy.

use serde_json::{Map, Value};

use super::schema::FieldSpec;
use crate::error::ValidationError;

/// How inbound payloads are normalized before reaching business handlers.
///
/// `Default` is the permissive policy: nothing stripped, nothing coerced,
/// unknown fields tolerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidationPolicy {
    /// Coerce declared fields to their declared kind.
    pub transform: bool,
    /// Strip fields the payload type does not declare.
    pub whitelist: bool,
    /// Reject payloads carrying fields the payload type does not declare.
    pub forbid_unknown: bool,
}

impl ValidationPolicy {
    /// All three rules enabled.
    pub const fn strict() -> Self {
        Self {
            transform: true,
            whitelist: true,
            forbid_unknown: true,
        }
    }

    /// Validate `payload` against `fields` and return the normalized value.
    ///
    /// All violations are collected before failing. `forbid_unknown` takes
    /// precedence over `whitelist`: an undeclared field is reported, not
    /// silently dropped.
    pub fn apply(&self, fields: &[FieldSpec], payload: Value) -> Result<Value, ValidationError> {
        let mut obj = match payload {
            Value::Object(m) => m,
            Value::Null => Map::new(),
            _ => return Err(ValidationError::single("payload must be an object")),
        };

        let mut violations = Vec::new();

        let unknown: Vec<String> = obj
            .keys()
            .filter(|k| !fields.iter().any(|f| f.name == k.as_str()))
            .cloned()
            .collect();
        for key in unknown {
            if self.forbid_unknown {
                violations.push(format!("property {key} should not exist"));
            } else if self.whitelist {
                obj.remove(&key);
            }
        }

        for field in fields {
            let present = obj.get(field.name).filter(|v| !v.is_null());
            let Some(value) = present else {
                if field.required {
                    violations.push(format!("{} should not be empty", field.name));
                }
                continue;
            };

            if field.kind.matches(value) {
                continue;
            }

            let coerced = if self.transform {
                field.kind.coerce(value)
            } else {
                None
            };
            match coerced {
                Some(v) => {
                    obj.insert(field.name.to_string(), v);
                }
                None => violations.push(format!("{} must be {}", field.name, field.kind.describe())),
            }
        }

        if violations.is_empty() {
            Ok(Value::Object(obj))
        } else {
            tracing::debug!(count = violations.len(), "payload rejected by validation policy");
            Err(ValidationError {
                messages: violations,
            })
        }
    }
}

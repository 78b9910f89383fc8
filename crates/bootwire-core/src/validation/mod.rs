//! Request payload validation (transport-agnostic).
//!
//! Payload types declare their fields through [`Schema`]; a process-wide
//! [`ValidationPolicy`] decides what happens to undeclared fields and whether
//! declared fields are coerced to their target kind before deserialization.
//!
//! The engine operates on `serde_json::Value` so the same rules apply to JSON
//! bodies and to query strings (where every value arrives as a string).

pub mod policy;
pub mod schema;

pub use policy::ValidationPolicy;
pub use schema::{FieldKind, FieldSpec, Schema};

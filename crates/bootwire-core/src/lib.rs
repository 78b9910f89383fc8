//! bootwire core: transport-agnostic error types and payload validation.
//!
//! This crate defines the error surface and the validation engine shared by
//! the server runtime and the services it hosts. It carries no transport or
//! runtime dependencies so business modules can use it without pulling in
//! the HTTP stack.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths surface as `BootwireError`/`ValidationError` so a bad
//! payload can never take a service down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod validation;

pub use error::{BootwireError, ClientCode, Result, ValidationError};
pub use validation::{FieldKind, FieldSpec, Schema, ValidationPolicy};

//! Request policy layer (CORS, payload validation).
//!
//! CORS wraps the whole server; validation applies only to the business
//! pipeline through the extractors in [`validation`].

pub mod cors;
pub mod validation;

pub use validation::{ValidatedJson, ValidatedQuery, ValidationRejection};

//! Built-in business modules.
//!
//! Real services supply their own [`BusinessModule`](crate::module::BusinessModule);
//! the diagnostics module gives every binary a liveness route and an echo
//! route that runs through the validation pipeline.

pub mod diagnostics;

pub use diagnostics::{DiagnosticsModule, EchoRequest};

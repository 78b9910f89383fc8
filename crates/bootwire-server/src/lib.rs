//! bootwire server library entry.
//!
//! This crate wires configuration, the phased HTTP application, request
//! policy (CORS + validation), and metrics exposition into one bootstrap
//! sequence shared by every service binary. It is intended to be consumed by
//! the binaries in `src/bin/` and by integration tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod app;
pub mod bootstrap;
pub mod config;
pub mod module;
pub mod obs;
pub mod ops;
pub mod policy;
pub mod services;

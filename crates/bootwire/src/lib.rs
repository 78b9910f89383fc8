//! Top-level facade crate for bootwire.
//!
//! Re-exports core types and the server library so services can depend on a single crate.

pub mod core {
    pub use bootwire_core::*;
}

pub mod server {
    pub use bootwire_server::*;
}

//! Shared error type across bootwire crates.

use std::fmt;

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input / payload rejected by the validation policy.
    BadRequest,
    /// Startup configuration is invalid.
    Configuration,
    /// Middleware attached after the application was finalized.
    LateRegistration,
    /// Listening socket could not be bound.
    Bind,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::Configuration => "CONFIGURATION",
            ClientCode::LateRegistration => "LATE_REGISTRATION",
            ClientCode::Bind => "BIND",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Every violation found while validating one payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationError {
    pub messages: Vec<String>,
}

impl ValidationError {
    pub fn single(msg: impl Into<String>) -> Self {
        Self {
            messages: vec![msg.into()],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.messages.join("; "))
    }
}

impl std::error::Error for ValidationError {}

/// Shared result type.
pub type Result<T> = std::result::Result<T, BootwireError>;

/// Unified error type used by core and server.
#[derive(Debug, Error)]
pub enum BootwireError {
    #[error("configuration: {0}")]
    Configuration(String),
    #[error("late registration: {0}")]
    LateRegistration(String),
    #[error("bind {addr} failed: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("internal: {0}")]
    Internal(String),
}

impl BootwireError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            BootwireError::Configuration(_) => ClientCode::Configuration,
            BootwireError::LateRegistration(_) => ClientCode::LateRegistration,
            BootwireError::Bind { .. } => ClientCode::Bind,
            BootwireError::Validation(_) => ClientCode::BadRequest,
            BootwireError::Internal(_) => ClientCode::Internal,
        }
    }
}

//! Payload extractors that enforce the global validation policy.
//!
//! The application installs its [`ValidationPolicy`] as a request extension
//! on every business route; these extractors read it, normalize the payload
//! through the core engine and only then deserialize into the handler type.
//! Routes outside the business pipeline (the raw `/metrics` route) never see
//! the extension.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::{
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use bootwire_core::error::BootwireError;
use bootwire_core::validation::{Schema, ValidationPolicy};

/// Client error produced when a payload fails extraction or validation.
#[derive(Debug)]
pub struct ValidationRejection {
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ValidationRejection {
    fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            messages: vec![msg.into()],
        }
    }
}

impl From<BootwireError> for ValidationRejection {
    fn from(e: BootwireError) -> Self {
        tracing::debug!(code = e.client_code().as_str(), error = %e, "payload rejected");
        match e {
            BootwireError::Validation(v) => Self {
                status: StatusCode::BAD_REQUEST,
                messages: v.messages,
            },
            other => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                messages: vec![other.to_string()],
            },
        }
    }
}

impl IntoResponse for ValidationRejection {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "statusCode": self.status.as_u16(),
            "message": self.messages,
            "error": self.status.canonical_reason().unwrap_or("Bad Request"),
        }));
        (self.status, body).into_response()
    }
}

fn decode<T>(policy: Option<ValidationPolicy>, value: Value) -> Result<T, ValidationRejection>
where
    T: DeserializeOwned + Schema,
{
    let value = match policy {
        Some(p) => p.apply(T::fields(), value).map_err(BootwireError::from)?,
        None => value,
    };
    serde_json::from_value(value).map_err(|e| ValidationRejection::bad_request(e.to_string()))
}

/// JSON body validated against `T`'s declared fields.
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Schema,
    S: Send + Sync,
{
    type Rejection = ValidationRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let policy = req.extensions().get::<ValidationPolicy>().copied();
        let Json(value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|e| ValidationRejection {
                status: e.status(),
                messages: vec![e.body_text()],
            })?;
        decode(policy, value).map(ValidatedJson)
    }
}

/// Query string validated against `T`'s declared fields. Every raw value is a
/// string, so numeric and boolean fields only pass when `transform` is on.
#[derive(Debug)]
pub struct ValidatedQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Schema,
    S: Send + Sync,
{
    type Rejection = ValidationRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let policy = parts.extensions.get::<ValidationPolicy>().copied();
        let Query(raw) = Query::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|e| ValidationRejection::bad_request(e.body_text()))?;
        let value = Value::Object(raw.into_iter().map(|(k, v)| (k, Value::String(v))).collect());
        decode(policy, value).map(ValidatedQuery)
    }
}

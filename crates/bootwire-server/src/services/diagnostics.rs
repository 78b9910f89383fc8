use std::sync::Arc;

use async_trait::async_trait;
use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use bootwire_core::error::Result;
use bootwire_core::validation::{FieldKind, FieldSpec, Schema};

use crate::module::{BusinessModule, ModuleContext};
use crate::obs::CounterVec;
use crate::policy::{ValidatedJson, ValidatedQuery};

/// Liveness and echo routes; mounted by every built-in service binary.
#[derive(Default)]
pub struct DiagnosticsModule;

impl DiagnosticsModule {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct EchoRequest {
    pub message: String,
    #[serde(default)]
    pub repeat: Option<i64>,
    /// Undeclared fields that survived the validation policy.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Schema for EchoRequest {
    fn fields() -> &'static [FieldSpec] {
        const FIELDS: &[FieldSpec] = &[
            FieldSpec::required("message", FieldKind::String),
            FieldSpec::optional("repeat", FieldKind::Integer),
        ];
        FIELDS
    }
}

#[derive(Clone)]
struct DiagState {
    service: Arc<str>,
    echo_requests: Arc<CounterVec>,
}

#[async_trait]
impl BusinessModule for DiagnosticsModule {
    fn name(&self) -> &'static str {
        "diagnostics"
    }

    fn routes(&self, ctx: &ModuleContext) -> Result<Router> {
        let state = DiagState {
            service: Arc::from(ctx.config.name.as_str()),
            echo_requests: ctx
                .metrics
                .counter("echo_requests_total", "Echo requests accepted, by source.")?,
        };

        Ok(Router::new()
            .route("/health", get(health))
            .route("/echo", get(echo_query).post(echo_body))
            .with_state(state))
    }
}

async fn health(State(st): State<DiagState>) -> Json<Value> {
    Json(json!({ "service": &*st.service, "status": "ok" }))
}

async fn echo_body(
    State(st): State<DiagState>,
    ValidatedJson(req): ValidatedJson<EchoRequest>,
) -> Json<EchoRequest> {
    st.echo_requests.inc(&[("source", "body")]);
    Json(req)
}

async fn echo_query(
    State(st): State<DiagState>,
    ValidatedQuery(req): ValidatedQuery<EchoRequest>,
) -> Json<EchoRequest> {
    st.echo_requests.inc(&[("source", "query")]);
    Json(req)
}

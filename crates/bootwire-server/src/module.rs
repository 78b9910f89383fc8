//! Seam between the bootstrap layer and the business logic it hosts.
//!
//! A service's controllers, persistence and pub/sub live behind
//! [`BusinessModule`]. The orchestrator only asks it for a router and never
//! inspects what it contains.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;

use bootwire_core::error::Result;

use crate::config::ServiceConfig;
use crate::obs::MetricsRegistry;

/// Resources injected into a business module at construction time.
#[derive(Clone)]
pub struct ModuleContext {
    pub config: Arc<ServiceConfig>,
    pub metrics: Arc<MetricsRegistry>,
}

#[async_trait]
pub trait BusinessModule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Business routes, relative to the global prefix. Payload extractors
    /// (`ValidatedJson`, `ValidatedQuery`) pick up the global validation
    /// policy automatically.
    fn routes(&self, ctx: &ModuleContext) -> Result<Router>;

    /// Called once after the server stopped accepting traffic.
    async fn on_shutdown(&self) {}
}


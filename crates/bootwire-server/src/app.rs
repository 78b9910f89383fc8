//! HTTP application with an explicit construction phase.
//!
//! Middleware can only be attached while the application is `Configuring`.
//! `init` freezes the business pipeline; afterwards only raw routes on the
//! [`HttpAdapter`] may still be added. The served router is laid out as:
//!
//! ```text
//! TraceLayer
//! └─ CorsLayer                       (when enabled)
//!    └─ raw routes (/metrics, ...)   (no validation, no prefix)
//!       └─ fallback: business pipeline
//!          └─ Extension(ValidationPolicy)
//!             └─ nest(prefix, module routes)
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{handler::Handler, routing::get, Extension, Router};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use bootwire_core::error::{BootwireError, Result};
use bootwire_core::validation::ValidationPolicy;

use crate::config::{normalize_prefix, ServiceConfig};
use crate::module::{BusinessModule, ModuleContext};
use crate::policy::cors;

/// Completed bootstrap steps, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootStep {
    Created,
    CorsEnabled,
    ValidationInstalled,
    PrefixApplied(String),
    Finalized,
    RawRouteAttached(String),
    Bound(SocketAddr),
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Configuring,
    Finalized,
}

/// Routes registered directly on the server, outside the business pipeline.
#[derive(Default)]
pub struct HttpAdapter {
    router: Router,
    paths: Vec<String>,
}

impl HttpAdapter {
    /// Register a raw `GET` route. Raw routes take precedence over business
    /// routes with the same path.
    pub fn get<H, T>(&mut self, path: &str, handler: H) -> Result<()>
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        if !path.starts_with('/') || self.paths.iter().any(|p| p == path) {
            return Err(BootwireError::Configuration(format!(
                "raw route {path:?} is invalid or already registered"
            )));
        }
        self.router = std::mem::take(&mut self.router).route(path, get(handler));
        self.paths.push(path.to_string());
        Ok(())
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }
}

pub struct Application {
    config: Arc<ServiceConfig>,
    module_name: &'static str,
    business: Router,
    cors: Option<CorsLayer>,
    validation: Option<ValidationPolicy>,
    prefix: Option<String>,
    pipeline: Option<Router>,
    adapter: HttpAdapter,
    steps: Vec<BootStep>,
}

impl Application {
    /// Construct the application around an opaque business module.
    pub fn create(module: &dyn BusinessModule, ctx: &ModuleContext) -> Result<Self> {
        let business = module.routes(ctx)?;
        tracing::debug!(service = %ctx.config.name, module = module.name(), "application created");
        Ok(Self {
            config: Arc::clone(&ctx.config),
            module_name: module.name(),
            business,
            cors: None,
            validation: None,
            prefix: None,
            pipeline: None,
            adapter: HttpAdapter::default(),
            steps: vec![BootStep::Created],
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn module_name(&self) -> &'static str {
        self.module_name
    }

    pub fn phase(&self) -> Phase {
        if self.pipeline.is_some() {
            Phase::Finalized
        } else {
            Phase::Configuring
        }
    }

    pub fn steps(&self) -> &[BootStep] {
        &self.steps
    }

    fn ensure_configuring(&self, what: &str) -> Result<()> {
        match self.phase() {
            Phase::Configuring => Ok(()),
            Phase::Finalized => Err(BootwireError::LateRegistration(format!(
                "{what} attached after init"
            ))),
        }
    }

    /// Reflect any origin and allow credentials on every response.
    pub fn enable_cors(&mut self) -> Result<()> {
        self.ensure_configuring("cors")?;
        self.cors = Some(cors::permissive_with_credentials());
        self.steps.push(BootStep::CorsEnabled);
        Ok(())
    }

    pub fn use_global_validation(&mut self, policy: ValidationPolicy) -> Result<()> {
        self.ensure_configuring("validation policy")?;
        self.validation = Some(policy);
        self.steps.push(BootStep::ValidationInstalled);
        Ok(())
    }

    pub fn set_global_prefix(&mut self, prefix: &str) -> Result<()> {
        self.ensure_configuring("global prefix")?;
        let prefix = normalize_prefix(prefix)?
            .ok_or_else(|| BootwireError::Configuration("global prefix must not be empty".into()))?;
        self.steps.push(BootStep::PrefixApplied(prefix.clone()));
        self.prefix = Some(prefix);
        Ok(())
    }

    /// Freeze the business pipeline. Calling it again is a no-op.
    pub fn init(&mut self) -> Result<()> {
        if self.phase() == Phase::Finalized {
            return Ok(());
        }

        let business = std::mem::take(&mut self.business);
        let mut pipeline = match &self.prefix {
            Some(prefix) => Router::new().nest(prefix, business),
            None => business,
        };
        if let Some(policy) = self.validation {
            pipeline = pipeline.layer(Extension(policy));
        }

        self.pipeline = Some(pipeline);
        self.steps.push(BootStep::Finalized);
        tracing::debug!(service = %self.config.name, "application finalized");
        Ok(())
    }

    /// Low-level route table of the underlying server.
    pub fn http_adapter(&mut self) -> &mut HttpAdapter {
        &mut self.adapter
    }

    /// Record a raw route attachment made through [`Application::http_adapter`].
    pub fn note_raw_route(&mut self, path: &str) {
        self.steps.push(BootStep::RawRouteAttached(path.to_string()));
    }

    /// The complete server router. Only available once finalized.
    pub fn router(&self) -> Result<Router> {
        let pipeline = self
            .pipeline
            .clone()
            .ok_or_else(|| BootwireError::Internal("application not finalized".into()))?;

        let mut server = self.adapter.router.clone().fallback_service(pipeline);
        if let Some(cors) = &self.cors {
            server = server.layer(cors.clone());
        }
        Ok(server.layer(TraceLayer::new_for_http()))
    }

    /// Finalize if needed and bind `addr`. Nothing is served until
    /// [`BoundServer::serve`] runs.
    pub async fn listen(&mut self, addr: &str) -> Result<BoundServer> {
        self.init()?;
        let router = self.router()?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| BootwireError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| BootwireError::Bind {
            addr: addr.to_string(),
            source,
        })?;

        self.steps.push(BootStep::Bound(local_addr));
        Ok(BoundServer {
            listener,
            router,
            local_addr,
        })
    }
}

/// A bound listener paired with its router.
pub struct BoundServer {
    listener: TcpListener,
    router: Router,
    local_addr: SocketAddr,
}

impl BoundServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until `shutdown` resolves, then drain.
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| BootwireError::Internal(format!("server failed: {e}")))
    }
}

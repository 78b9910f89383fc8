//! Bootstrap orchestrator.
//!
//! One parameterized startup sequence shared by every service:
//!
//! 1. create the application around the business module
//! 2. CORS (outermost, covers `/metrics` too)
//! 3. global validation policy
//! 4. optional global prefix
//! 5. finalize
//! 6. attach `/metrics` on the raw route table
//! 7. bind
//! 8. readiness line
//!
//! Any failure before step 7 aborts startup without binding. Bind failures
//! are returned as-is; there is no retry.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use axum::Router;
use tracing_subscriber::{fmt, EnvFilter};

use bootwire_core::error::Result;

use crate::app::{Application, BootStep, BoundServer};
use crate::config::{self, ServiceConfig, ServiceProfile};
use crate::module::{BusinessModule, ModuleContext};
use crate::obs::MetricsRegistry;
use crate::ops;
use crate::services::DiagnosticsModule;

pub struct Orchestrator {
    config: Arc<ServiceConfig>,
}

impl Orchestrator {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Steps 1-6. The returned service is fully wired but not yet bound.
    pub fn prepare(&self, module: Arc<dyn BusinessModule>) -> Result<PreparedService> {
        let cfg = &self.config;
        let registry = ops::create_registry(&cfg.name, cfg.sample_interval)?;
        let ctx = ModuleContext {
            config: Arc::clone(cfg),
            metrics: Arc::clone(&registry),
        };

        let mut app = Application::create(module.as_ref(), &ctx)?;
        if cfg.cors_enabled {
            app.enable_cors()?;
        }
        app.use_global_validation(cfg.validation)?;
        if let Some(prefix) = &cfg.global_prefix {
            app.set_global_prefix(prefix)?;
        }
        app.init()?;
        ops::attach(&mut app, Arc::clone(&registry))?;

        let raw_routes = app.http_adapter().paths().to_vec();
        tracing::debug!(
            service = %cfg.name,
            module = app.module_name(),
            raw_routes = ?raw_routes,
            steps = ?app.steps(),
            "bootstrap prepared"
        );
        Ok(PreparedService {
            config: Arc::clone(cfg),
            app,
            registry,
            module,
        })
    }
}

pub struct PreparedService {
    config: Arc<ServiceConfig>,
    app: Application,
    registry: Arc<MetricsRegistry>,
    module: Arc<dyn BusinessModule>,
}

impl PreparedService {
    pub fn steps(&self) -> &[BootStep] {
        self.app.steps()
    }

    pub fn registry(&self) -> Arc<MetricsRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn application(&mut self) -> &mut Application {
        &mut self.app
    }

    /// The router that will be served, for in-process requests.
    pub fn router(&self) -> Result<Router> {
        self.app.router()
    }

    /// Steps 7-8: bind the configured address and announce readiness.
    pub async fn bind(mut self) -> Result<RunningService> {
        let server = match self.app.listen(&self.config.bind_addr()).await {
            Ok(server) => server,
            Err(e) => {
                self.registry.stop_sampling();
                return Err(e);
            }
        };

        let mut steps = self.app.steps().to_vec();
        announce_ready(&self.config, server.local_addr());
        steps.push(BootStep::Ready);

        Ok(RunningService {
            server,
            registry: self.registry,
            module: self.module,
            steps,
        })
    }
}

fn announce_ready(cfg: &ServiceConfig, addr: SocketAddr) {
    tracing::info!(
        service = %cfg.name,
        port = addr.port(),
        prefix = cfg.global_prefix.as_deref().unwrap_or(""),
        "{} listening on port {}",
        cfg.name,
        addr.port()
    );
    for ep in &cfg.endpoints {
        let value = ep.value(addr.port());
        tracing::info!(service = %cfg.name, endpoint = %ep.label, "{}: {}", ep.label, value);
    }
}

pub struct RunningService {
    server: BoundServer,
    registry: Arc<MetricsRegistry>,
    module: Arc<dyn BusinessModule>,
    steps: Vec<BootStep>,
}

impl RunningService {
    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn steps(&self) -> &[BootStep] {
        &self.steps
    }

    pub fn registry(&self) -> Arc<MetricsRegistry> {
        Arc::clone(&self.registry)
    }

    /// Serve until `shutdown` resolves, then stop the sampler and let the
    /// module clean up.
    pub async fn serve_until<F>(self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let res = self.server.serve(shutdown).await;
        self.registry.stop_sampling();
        self.module.on_shutdown().await;
        tracing::info!("server stopped");
        res
    }
}

/// Full sequence for one service, serving until Ctrl-C / SIGTERM.
pub async fn run(config: ServiceConfig, module: Arc<dyn BusinessModule>) -> Result<()> {
    let prepared = Orchestrator::new(config)?.prepare(module)?;
    let running = prepared.bind().await?;
    running.serve_until(shutdown_signal()).await
}

/// Entry point shared by the service binaries.
pub async fn main_for(profile: ServiceProfile) -> ExitCode {
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();

    let result = match config::load(profile) {
        Ok(cfg) => run(cfg, Arc::new(DiagnosticsModule::new())).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(service = %profile, code = e.client_code().as_str(), error = %e, "fatal startup failure");
            ExitCode::FAILURE
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("signal received, starting graceful shutdown");
}

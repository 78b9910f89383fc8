//! Service configuration.
//!
//! Resolution order: profile defaults, then the optional YAML file named by
//! `BOOTWIRE_CONFIG` (strict parsing), then environment variables. The result
//! is validated once and never mutated afterwards.

pub mod profile;
pub mod schema;

use std::fs;
use std::time::Duration;

use bootwire_core::error::{BootwireError, Result};
use bootwire_core::validation::ValidationPolicy;

pub use profile::ServiceProfile;
pub use schema::{MetricsSection, OverrideFile, ServiceSection, ValidationSection};

/// Environment variable naming the optional override file.
pub const CONFIG_PATH_ENV: &str = "BOOTWIRE_CONFIG";

const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(10);

/// A service-specific connection coordinate shown on the readiness line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub label: String,
    target: Target,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Fixed(String),
    /// Served by this process; the port is only known after bind.
    Local { scheme: &'static str, path: String },
}

impl Endpoint {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target: Target::Fixed(value.into()),
        }
    }

    /// `<scheme>://localhost:<port><path>`, resolved against the bound port.
    pub fn local(label: impl Into<String>, scheme: &'static str, path: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target: Target::Local {
                scheme,
                path: path.into(),
            },
        }
    }

    pub fn value(&self, port: u16) -> String {
        match &self.target {
            Target::Fixed(v) => v.clone(),
            Target::Local { scheme, path } => format!("{scheme}://localhost:{port}{path}"),
        }
    }
}

/// Immutable per-process configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub name: String,
    pub host: String,
    /// `0` asks the OS for an ephemeral port.
    pub port: u16,
    pub cors_enabled: bool,
    pub validation: ValidationPolicy,
    /// Normalized (`/api/v1`), never a bare `/`.
    pub global_prefix: Option<String>,
    pub endpoints: Vec<Endpoint>,
    pub sample_interval: Duration,
}

impl ServiceConfig {
    /// Minimal config: CORS on, strict validation, no prefix.
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: "0.0.0.0".into(),
            port,
            cors_enabled: true,
            validation: ValidationPolicy::strict(),
            global_prefix: None,
            endpoints: Vec::new(),
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
        }
    }

    pub fn for_profile(profile: ServiceProfile) -> Self {
        let mut cfg = Self::new(profile.service_name(), profile.default_port());
        cfg.global_prefix = profile.default_prefix().map(str::to_string);
        cfg
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(BootwireError::Configuration("service name must not be empty".into()));
        }
        if self.host.trim().is_empty() {
            return Err(BootwireError::Configuration("host must not be empty".into()));
        }
        if let Some(p) = &self.global_prefix {
            normalize_prefix(p)?;
        }
        schema::validate_sample_interval_ms(self.sample_interval.as_millis() as u64)?;
        Ok(())
    }

    fn apply_override(&mut self, file: OverrideFile) -> Result<()> {
        let svc = file.service;
        if let Some(name) = svc.name {
            self.name = name;
        }
        if let Some(host) = svc.host {
            self.host = host;
        }
        if let Some(port) = svc.port {
            self.port = port;
        }
        if let Some(cors) = svc.cors {
            self.cors_enabled = cors;
        }
        if let Some(prefix) = svc.global_prefix {
            self.global_prefix = normalize_prefix(&prefix)?;
        }

        let v = svc.validation;
        self.validation = ValidationPolicy {
            transform: v.transform.unwrap_or(self.validation.transform),
            whitelist: v.whitelist.unwrap_or(self.validation.whitelist),
            forbid_unknown: v.forbid_unknown.unwrap_or(self.validation.forbid_unknown),
        };

        if let Some(ms) = file.metrics.sample_interval_ms {
            self.sample_interval = Duration::from_millis(ms);
        }
        Ok(())
    }

    fn apply_env<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset.
        let var = |k: &str| env(k).filter(|v| !v.trim().is_empty());
        if let Some(raw) = var("PORT") {
            self.port = raw.trim().parse().map_err(|_| {
                BootwireError::Configuration(format!("PORT must be a port number, got {raw:?}"))
            })?;
        }
        if let Some(host) = var("HOST") {
            self.host = host.trim().to_string();
        }
        Ok(())
    }
}

/// Load the configuration of `profile` from the process environment.
pub fn load(profile: ServiceProfile) -> Result<ServiceConfig> {
    load_with(profile, |k| std::env::var(k).ok())
}

/// Same as [`load`] with an injectable environment lookup.
pub fn load_with<F>(profile: ServiceProfile, env: F) -> Result<ServiceConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut cfg = ServiceConfig::for_profile(profile);

    if let Some(path) = env(CONFIG_PATH_ENV) {
        cfg.apply_override(load_override_file(&path)?)?;
    }
    cfg.apply_env(&env)?;
    cfg.validate()?;

    cfg.endpoints = profile.endpoints(&cfg, &env);
    Ok(cfg)
}

pub fn load_override_file(path: &str) -> Result<OverrideFile> {
    let s = fs::read_to_string(path)
        .map_err(|e| BootwireError::Configuration(format!("read config {path} failed: {e}")))?;
    load_override_str(&s)
}

pub fn load_override_str(s: &str) -> Result<OverrideFile> {
    let file: OverrideFile = serde_yaml::from_str(s)
        .map_err(|e| BootwireError::Configuration(format!("invalid yaml: {e}")))?;
    file.validate()?;
    Ok(file)
}

/// Normalize a route prefix to `/seg/seg`. An empty prefix (or `/`) means
/// no prefix at all.
pub fn normalize_prefix(raw: &str) -> Result<Option<String>> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Ok(None);
    }
    for seg in trimmed.split('/') {
        let valid = !seg.is_empty()
            && seg
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'));
        if !valid {
            return Err(BootwireError::Configuration(format!("invalid global prefix: {raw:?}")));
        }
    }
    Ok(Some(format!("/{trimmed}")))
}

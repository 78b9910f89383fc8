//! Built-in service profiles.
//!
//! Each profile fixes the defaults of one of the four processes and knows
//! which environment variables describe the datastore it talks to. Those
//! coordinates are only echoed on the readiness line; nothing here dials them.

use std::fmt;
use std::str::FromStr;

use bootwire_core::error::BootwireError;

use super::{Endpoint, ServiceConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceProfile {
    ApiGateway,
    UserService,
    ProductService,
    NotificationService,
}

impl ServiceProfile {
    pub const ALL: [ServiceProfile; 4] = [
        ServiceProfile::ApiGateway,
        ServiceProfile::UserService,
        ServiceProfile::ProductService,
        ServiceProfile::NotificationService,
    ];

    pub fn service_name(self) -> &'static str {
        match self {
            ServiceProfile::ApiGateway => "api-gateway",
            ServiceProfile::UserService => "user-service",
            ServiceProfile::ProductService => "product-service",
            ServiceProfile::NotificationService => "notification-service",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            ServiceProfile::ApiGateway => 3000,
            ServiceProfile::UserService => 3001,
            ServiceProfile::ProductService => 3002,
            ServiceProfile::NotificationService => 3003,
        }
    }

    /// Only the gateway namespaces its routes.
    pub fn default_prefix(self) -> Option<&'static str> {
        match self {
            ServiceProfile::ApiGateway => Some("/api/v1"),
            _ => None,
        }
    }

    /// Connection endpoints reported once the service is listening.
    pub fn endpoints<F>(self, cfg: &ServiceConfig, env: F) -> Vec<Endpoint>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |k: &str| env(k).unwrap_or_else(|| "<unset>".to_string());
        match self {
            ServiceProfile::ApiGateway => vec![Endpoint::local(
                "docs",
                "http",
                cfg.global_prefix.clone().unwrap_or_default(),
            )],
            ServiceProfile::UserService => vec![Endpoint::new(
                "database",
                format!(
                    "{}:{}/{}",
                    var("DATABASE_HOST"),
                    var("DATABASE_PORT"),
                    var("DATABASE_NAME")
                ),
            )],
            ServiceProfile::ProductService => vec![Endpoint::new("mongodb", var("MONGODB_URI"))],
            ServiceProfile::NotificationService => vec![
                Endpoint::local("websocket", "ws", ""),
                Endpoint::new("redis", format!("{}:{}", var("REDIS_HOST"), var("REDIS_PORT"))),
            ],
        }
    }
}

impl fmt::Display for ServiceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.service_name())
    }
}

impl FromStr for ServiceProfile {
    type Err = BootwireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServiceProfile::ALL
            .into_iter()
            .find(|p| p.service_name() == s)
            .ok_or_else(|| BootwireError::Configuration(format!("unknown service profile: {s}")))
    }
}

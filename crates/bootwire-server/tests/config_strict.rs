#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use bootwire_core::validation::ValidationPolicy;
use bootwire_server::config::{self, ServiceConfig, ServiceProfile, CONFIG_PATH_ENV};

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |k: &str| map.get(k).cloned()
}

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
service:
  validation:
    forbid_unknwon: true # typo should fail
"#;

    let err = config::load_override_str(bad).expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "CONFIGURATION");
}

#[test]
fn unsupported_version_is_rejected() {
    let err = config::load_override_str("version: 2\n").expect_err("must fail");
    assert!(err.to_string().contains("unsupported config version"));
}

#[test]
fn sample_interval_out_of_range_is_rejected() {
    let bad = "version: 1\nmetrics:\n  sample_interval_ms: 5\n";
    let err = config::load_override_str(bad).expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "CONFIGURATION");
}

#[test]
fn ok_minimal_override() {
    let file = config::load_override_str("version: 1\n").expect("must parse");
    assert_eq!(file.version, 1);
    assert!(file.service.port.is_none());
}

#[test]
fn profile_defaults() {
    let expected = [
        (ServiceProfile::ApiGateway, "api-gateway", 3000, Some("/api/v1")),
        (ServiceProfile::UserService, "user-service", 3001, None),
        (ServiceProfile::ProductService, "product-service", 3002, None),
        (ServiceProfile::NotificationService, "notification-service", 3003, None),
    ];
    for (profile, name, port, prefix) in expected {
        let cfg = config::load_with(profile, env_of(&[])).expect("defaults are valid");
        assert_eq!(cfg.name, name);
        assert_eq!(cfg.port, port);
        assert_eq!(cfg.global_prefix.as_deref(), prefix);
        assert!(cfg.cors_enabled);
        assert_eq!(cfg.validation, ValidationPolicy::strict());
        assert_eq!(cfg.sample_interval, Duration::from_secs(10));
        assert_eq!(name.parse::<ServiceProfile>().unwrap(), profile);
    }
}

#[test]
fn port_env_overrides_default() {
    let cfg = config::load_with(ServiceProfile::ProductService, env_of(&[("PORT", "4002")])).unwrap();
    assert_eq!(cfg.port, 4002);
    assert_eq!(cfg.bind_addr(), "0.0.0.0:4002");
}

#[test]
fn invalid_port_is_a_configuration_error() {
    for raw in ["abc", "70000", "-1"] {
        let err = config::load_with(ServiceProfile::UserService, env_of(&[("PORT", raw)]))
            .expect_err("must fail");
        assert_eq!(err.client_code().as_str(), "CONFIGURATION", "PORT={raw:?}");
    }
}

#[test]
fn blank_port_and_host_fall_back_to_defaults() {
    for raw in ["", "  "] {
        let cfg = config::load_with(
            ServiceProfile::UserService,
            env_of(&[("PORT", raw), ("HOST", raw)]),
        )
        .expect("blank values are unset");
        assert_eq!(cfg.port, 3001, "PORT={raw:?}");
        assert_eq!(cfg.bind_addr(), "0.0.0.0:3001");
    }
}

#[test]
fn endpoints_follow_datastore_env() {
    let cfg = config::load_with(
        ServiceProfile::UserService,
        env_of(&[("DATABASE_HOST", "db"), ("DATABASE_PORT", "5432"), ("DATABASE_NAME", "users")]),
    )
    .unwrap();
    assert_eq!(cfg.endpoints.len(), 1);
    assert_eq!(cfg.endpoints[0].label, "database");
    assert_eq!(cfg.endpoints[0].value(cfg.port), "db:5432/users");

    let cfg = config::load_with(
        ServiceProfile::NotificationService,
        env_of(&[("PORT", "4003"), ("REDIS_HOST", "cache")]),
    )
    .unwrap();
    let values: Vec<String> = cfg.endpoints.iter().map(|e| e.value(cfg.port)).collect();
    assert_eq!(values, vec!["ws://localhost:4003", "cache:<unset>"]);

    let cfg = config::load_with(ServiceProfile::ApiGateway, env_of(&[])).unwrap();
    assert_eq!(cfg.endpoints[0].value(cfg.port), "http://localhost:3000/api/v1");
}

#[test]
fn local_endpoints_follow_the_bound_port() {
    let cfg = config::load_with(ServiceProfile::ApiGateway, env_of(&[("PORT", "0")])).unwrap();
    assert_eq!(cfg.endpoints[0].value(41234), "http://localhost:41234/api/v1");

    let cfg = config::load_with(ServiceProfile::NotificationService, env_of(&[("PORT", "0")])).unwrap();
    assert_eq!(cfg.endpoints[0].value(41235), "ws://localhost:41235");
    assert_eq!(cfg.endpoints[1].value(41235), "<unset>:<unset>");
}

#[test]
fn file_overrides_defaults_and_env_wins_over_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
version: 1
service:
  port: 5000
  cors: false
  global_prefix: "/internal/"
  validation:
    forbid_unknown: false
metrics:
  sample_interval_ms: 2500
"#
    )
    .unwrap();
    let path = file.path().to_string_lossy().to_string();

    let cfg = config::load_with(
        ServiceProfile::ProductService,
        env_of(&[(CONFIG_PATH_ENV, path.as_str())]),
    )
    .unwrap();
    assert_eq!(cfg.port, 5000);
    assert!(!cfg.cors_enabled);
    assert_eq!(cfg.global_prefix.as_deref(), Some("/internal"));
    assert_eq!(
        cfg.validation,
        ValidationPolicy {
            transform: true,
            whitelist: true,
            forbid_unknown: false
        }
    );
    assert_eq!(cfg.sample_interval, Duration::from_millis(2500));

    let cfg = config::load_with(
        ServiceProfile::ProductService,
        env_of(&[(CONFIG_PATH_ENV, path.as_str()), ("PORT", "6000")]),
    )
    .unwrap();
    assert_eq!(cfg.port, 6000);
}

#[test]
fn missing_override_file_is_fatal() {
    let err = config::load_with(
        ServiceProfile::ProductService,
        env_of(&[(CONFIG_PATH_ENV, "/nonexistent/bootwire.yaml")]),
    )
    .expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "CONFIGURATION");
}

#[test]
fn prefix_normalization() {
    assert_eq!(config::normalize_prefix("api/v1").unwrap().as_deref(), Some("/api/v1"));
    assert_eq!(config::normalize_prefix("/api/v1/").unwrap().as_deref(), Some("/api/v1"));
    assert_eq!(config::normalize_prefix("/").unwrap(), None);
    assert!(config::normalize_prefix("api/{id}").is_err());
    assert!(config::normalize_prefix("api//v1").is_err());
}

#[test]
fn empty_service_name_is_rejected() {
    let cfg = ServiceConfig::new("  ", 3000);
    assert_eq!(cfg.validate().unwrap_err().client_code().as_str(), "CONFIGURATION");
}

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use bootwire_server::obs::MetricsRegistry;
use bootwire_server::ops;

fn sample_lines(body: &str) -> Vec<&str> {
    body.lines()
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect()
}

#[test]
fn counter_renders_with_default_label() {
    let reg = MetricsRegistry::new("user-service");
    let logins = reg.counter("logins_total", "Successful logins.").unwrap();
    logins.inc(&[("method", "password")]);
    logins.add(&[("method", "password")], 2);
    logins.inc(&[]);

    let body = reg.render();
    assert!(body.contains("# HELP logins_total Successful logins.\n# TYPE logins_total counter\n"));
    assert!(body.contains("logins_total{service=\"user-service\"} 1\n"));
    assert!(body.contains("logins_total{method=\"password\",service=\"user-service\"} 3\n"));
    assert_eq!(logins.get(&[("method", "password")]), 3.0);
}

#[test]
fn default_label_wins_over_sample_label() {
    let reg = MetricsRegistry::new("product-service");
    let c = reg.counter("spoofed_total", "x").unwrap();
    c.inc(&[("service", "someone-else")]);

    let body = reg.render();
    assert!(body.contains("spoofed_total{service=\"product-service\"} 1"));
    assert!(!body.contains("someone-else"));
}

#[test]
fn gauge_supports_fractional_updates() {
    let reg = MetricsRegistry::new("svc");
    let g = reg.gauge("queue_depth", "Items waiting.").unwrap();
    g.set(&[("queue", "mail")], 2.5);
    g.inc(&[("queue", "mail")]);
    g.dec(&[("queue", "sms")]);

    assert_eq!(g.get(&[("queue", "mail")]), 3.5);
    let body = reg.render();
    assert!(body.contains("queue_depth{queue=\"mail\",service=\"svc\"} 3.5"));
    assert!(body.contains("queue_depth{queue=\"sms\",service=\"svc\"} -1"));
}

#[test]
fn histogram_buckets_are_cumulative() {
    let reg = MetricsRegistry::new("svc");
    let h = reg
        .histogram("request_duration_seconds", "Latency.", &[0.5, 0.1, 1.0])
        .unwrap();
    h.observe(&[], 0.05);
    h.observe(&[], 0.3);
    h.observe_duration(&[], Duration::from_secs(2));

    let body = reg.render();
    assert!(body.contains("request_duration_seconds_bucket{service=\"svc\",le=\"0.1\"} 1\n"));
    assert!(body.contains("request_duration_seconds_bucket{service=\"svc\",le=\"0.5\"} 2\n"));
    assert!(body.contains("request_duration_seconds_bucket{service=\"svc\",le=\"1\"} 2\n"));
    assert!(body.contains("request_duration_seconds_bucket{service=\"svc\",le=\"+Inf\"} 3\n"));
    assert!(body.contains("request_duration_seconds_sum{service=\"svc\"} 2.35\n"));
    assert!(body.contains("request_duration_seconds_count{service=\"svc\"} 3\n"));
    assert_eq!(h.count(&[]), 3);
}

#[test]
fn counter_advance_never_goes_back() {
    let reg = MetricsRegistry::new("svc");
    let cpu = reg.counter("cpu_seconds_total", "x").unwrap();
    cpu.advance_to(&[], 1.25);
    cpu.advance_to(&[], 0.5);
    cpu.advance_to(&[], f64::NAN);
    assert_eq!(cpu.get(&[]), 1.25);
    cpu.inc(&[]);
    assert!(reg.render().contains("cpu_seconds_total{service=\"svc\"} 2.25\n"));
}

#[test]
fn label_values_are_escaped() {
    let reg = MetricsRegistry::new("svc");
    let c = reg.counter("odd_total", "x").unwrap();
    c.inc(&[("path", "a\"b\\c\nd")]);
    assert!(reg.render().contains(r#"path="a\"b\\c\nd""#));
}

/// Label names of one sample line, in order.
fn label_names(line: &str) -> Vec<String> {
    let Some(open) = line.find('{') else { return Vec::new() };
    let close = line.rfind('}').unwrap();
    line[open + 1..close]
        .split(',')
        .map(|pair| pair.split('=').next().unwrap().to_string())
        .collect()
}

#[test]
fn invalid_sample_labels_are_dropped() {
    let reg = MetricsRegistry::new("svc");
    let c = reg.counter("req_total", "x").unwrap();
    c.inc(&[("bad label", "x"), ("route", "/a")]);
    c.inc(&[("__internal", "x")]);
    c.inc(&[("dup", "1"), ("dup", "2")]);
    let h = reg.histogram("lat", "x", &[1.0]).unwrap();
    h.observe(&[("le", "oops")], 0.5);

    let body = reg.render();
    assert!(!body.contains("bad label"));
    assert!(!body.contains("__internal"));
    assert!(!body.contains("oops"));
    assert!(body.contains("req_total{route=\"/a\",service=\"svc\"} 1\n"));
    assert!(body.contains("req_total{service=\"svc\"} 1\n"));
    assert!(body.contains("lat_bucket{service=\"svc\",le=\"1\"} 1\n"));
    assert_eq!(h.count(&[]), 1);

    for line in sample_lines(&body) {
        let names = label_names(line);
        let mut unique = names.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(names.len(), unique.len(), "{line}");
        for name in &names {
            assert!(
                name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_'),
                "{line}"
            );
        }
    }
}

#[test]
fn reserved_default_labels_are_rejected() {
    assert!(MetricsRegistry::with_default_labels(&[("le", "x")]).is_err());
    assert!(MetricsRegistry::with_default_labels(&[("__name__", "x")]).is_err());
}

#[test]
fn same_name_same_kind_returns_shared_family() {
    let reg = MetricsRegistry::new("svc");
    let a = reg.counter("hits_total", "x").unwrap();
    let b = reg.counter("hits_total", "x").unwrap();
    a.inc(&[]);
    b.inc(&[]);
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.get(&[]), 2.0);
}

#[test]
fn kind_conflict_and_bad_names_are_configuration_errors() {
    let reg = MetricsRegistry::new("svc");
    reg.counter("hits_total", "x").unwrap();
    let err = reg.gauge("hits_total", "x").err().expect("kind conflict");
    assert_eq!(err.client_code().as_str(), "CONFIGURATION");

    assert!(reg.counter("9lives", "x").is_err());
    assert!(reg.counter("has-dash", "x").is_err());
    assert!(MetricsRegistry::with_default_labels(&[("bad label", "x")]).is_err());
}

#[test]
fn custom_default_labels_apply_to_every_sample() {
    let reg = MetricsRegistry::with_default_labels(&[("service", "svc"), ("zone", "eu")]).unwrap();
    reg.counter("a_total", "x").unwrap().inc(&[]);
    reg.gauge("b", "x").unwrap().set(&[("k", "v")], 1.0);
    for line in sample_lines(&reg.render()) {
        assert!(line.contains("service=\"svc\""), "{line}");
        assert!(line.contains("zone=\"eu\""), "{line}");
    }
}

#[test]
fn render_does_not_mutate() {
    let reg = MetricsRegistry::new("svc");
    reg.counter("c_total", "x").unwrap();
    let first = reg.render();
    let second = reg.render();
    assert_eq!(first, second);
    assert_eq!(reg.family_names(), vec!["c_total".to_string()]);
    assert!(sample_lines(&first).is_empty());
}

#[test]
fn registry_without_runtime_still_has_process_metrics() {
    let reg = ops::create_registry("batch-job", Duration::from_secs(10)).unwrap();
    assert!(!reg.is_sampling());

    let (body, content_type) = ops::handle_scrape(&reg);
    assert_eq!(content_type, "text/plain; version=0.0.4; charset=utf-8");
    assert!(body.contains("process_start_time_seconds{service=\"batch-job\"}"));
    assert!(body.contains("process_uptime_seconds{service=\"batch-job\"}"));
    assert!(body.contains("# TYPE process_cpu_seconds_total counter\n"));
    for line in sample_lines(&body) {
        assert!(line.contains("service=\"batch-job\""), "{line}");
    }
}

#[tokio::test]
async fn sampler_runs_until_stopped() {
    let reg = ops::create_registry("svc", Duration::from_millis(100)).unwrap();
    assert!(reg.is_sampling());

    tokio::time::sleep(Duration::from_millis(250)).await;
    let body = reg.render();
    assert!(body.contains("runtime_workers{service=\"svc\"} 1\n"));
    assert!(body.contains("runtime_scheduler_lag_seconds{service=\"svc\"}"));

    reg.stop_sampling();
    assert!(!reg.is_sampling());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_increments_are_not_lost() {
    let reg = Arc::new(MetricsRegistry::new("svc"));
    let c = reg.counter("writes_total", "x").unwrap();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let c = Arc::clone(&c);
        let reg = Arc::clone(&reg);
        tasks.push(tokio::spawn(async move {
            for _ in 0..1000 {
                c.inc(&[("kind", "a")]);
            }
            reg.render().len()
        }));
    }
    for t in tasks {
        t.await.unwrap();
    }
    assert_eq!(c.get(&[("kind", "a")]), 8000.0);
}

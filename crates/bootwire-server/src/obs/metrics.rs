//! Process-local metrics registry.
//!
//! Counter/gauge/histogram families with dynamic labels backed by `DashMap`
//! and atomics, so instrumentation never waits on a registry-wide lock.
//! Labels are flattened into sorted key vectors to keep deterministic
//! ordering. The registry carries default labels (`service=<name>`) that are
//! merged into every rendered sample and always win over a sample label with
//! the same name.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;

use bootwire_core::error::{BootwireError, Result};

/// Content type of the Prometheus text exposition format 0.0.4.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Default histogram buckets, in seconds.
pub const DEFAULT_BUCKETS: [f64; 11] = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Label carrying the bucket bound of histogram samples.
const BUCKET_LABEL: &str = "le";

type LabelKey = Vec<(String, String)>;

/// Sorted series key. Labels Prometheus would reject (bad names, `__` prefix,
/// `reserved`, repeated names) are dropped with a warning.
fn label_key(labels: &[(&str, &str)], reserved: Option<&str>) -> LabelKey {
    let mut key: LabelKey = Vec::with_capacity(labels.len());
    for &(k, v) in labels {
        if !is_valid_label_name(k) || k.starts_with("__") || Some(k) == reserved {
            tracing::warn!(label = k, "dropping invalid metric label");
            continue;
        }
        key.push((k.to_string(), v.to_string()));
    }
    key.sort();
    key.dedup_by(|a, b| a.0 == b.0);
    key
}

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}

fn fmt_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".into()
    } else if v == f64::INFINITY {
        "+Inf".into()
    } else if v == f64::NEG_INFINITY {
        "-Inf".into()
    } else {
        v.to_string()
    }
}

fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

fn is_valid_label_name(name: &str) -> bool {
    !name.contains(':') && is_valid_metric_name(name)
}

/// Renders `{a="1",b="2"}` from the series key merged with the defaults.
fn label_block(defaults: &[(String, String)], key: &LabelKey, le: Option<&str>) -> String {
    let mut merged: BTreeMap<&str, &str> = key.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    for (k, v) in defaults {
        merged.insert(k.as_str(), v.as_str());
    }

    let mut parts: Vec<String> = merged
        .into_iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect();
    if let Some(le) = le {
        parts.push(format!("{BUCKET_LABEL}=\"{le}\""));
    }

    if parts.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", parts.join(","))
    }
}

fn sorted_keys<V>(map: &DashMap<LabelKey, V>) -> Vec<LabelKey> {
    let mut keys: Vec<LabelKey> = map.iter().map(|r| r.key().clone()).collect();
    keys.sort();
    keys
}

/// Counter values are `f64` stored as raw bits so externally accumulated
/// totals (CPU seconds) can be exported without truncation.
#[derive(Default)]
pub struct CounterVec {
    map: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    /// Increment by an arbitrary value.
    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let counter = self.map.entry(label_key(labels, None)).or_insert_with(|| AtomicU64::new(0f64.to_bits()));
        let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
            Some((f64::from_bits(bits) + v as f64).to_bits())
        });
    }

    /// Raise the series to `total` when it is higher than the current value.
    /// Lower or non-finite totals are ignored so the series never goes back.
    pub fn advance_to(&self, labels: &[(&str, &str)], total: f64) {
        if !total.is_finite() {
            return;
        }
        let counter = self.map.entry(label_key(labels, None)).or_insert_with(|| AtomicU64::new(0f64.to_bits()));
        let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
            (total > f64::from_bits(bits)).then_some(total.to_bits())
        });
    }

    /// Current value of one series (0 when never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> f64 {
        self.map
            .get(&label_key(labels, None))
            .map(|c| f64::from_bits(c.load(Ordering::Relaxed)))
            .unwrap_or(0.0)
    }

    fn render(&self, name: &str, defaults: &[(String, String)], out: &mut String) {
        for key in sorted_keys(&self.map) {
            if let Some(r) = self.map.get(&key) {
                let val = f64::from_bits(r.value().load(Ordering::Relaxed));
                let _ = writeln!(out, "{}{} {}", name, label_block(defaults, &key, None), fmt_value(val));
            }
        }
    }
}

/// Gauge values are `f64`, stored as raw bits.
#[derive(Default)]
pub struct GaugeVec {
    map: DashMap<LabelKey, AtomicU64>,
}

impl GaugeVec {
    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) { self.add(labels, 1.0); }
    /// Decrement by 1.
    pub fn dec(&self, labels: &[(&str, &str)]) { self.add(labels, -1.0); }

    /// Add an arbitrary signed delta.
    pub fn add(&self, labels: &[(&str, &str)], v: f64) {
        let gauge = self.map.entry(label_key(labels, None)).or_insert_with(|| AtomicU64::new(0f64.to_bits()));
        let _ = gauge.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
            Some((f64::from_bits(bits) + v).to_bits())
        });
    }

    pub fn set(&self, labels: &[(&str, &str)], v: f64) {
        let gauge = self.map.entry(label_key(labels, None)).or_insert_with(|| AtomicU64::new(0f64.to_bits()));
        gauge.store(v.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self, labels: &[(&str, &str)]) -> f64 {
        self.map
            .get(&label_key(labels, None))
            .map(|g| f64::from_bits(g.load(Ordering::Relaxed)))
            .unwrap_or(0.0)
    }

    fn render(&self, name: &str, defaults: &[(String, String)], out: &mut String) {
        for key in sorted_keys(&self.map) {
            if let Some(r) = self.map.get(&key) {
                let val = f64::from_bits(r.value().load(Ordering::Relaxed));
                let _ = writeln!(out, "{}{} {}", name, label_block(defaults, &key, None), fmt_value(val));
            }
        }
    }
}

struct AtomicHistogram {
    count: AtomicU64,
    sum: AtomicU64,
    buckets: Vec<AtomicU64>,
}

impl AtomicHistogram {
    fn new(n: usize) -> Self {
        Self {
            count: AtomicU64::new(0),
            sum: AtomicU64::new(0f64.to_bits()),
            buckets: (0..n).map(|_| AtomicU64::new(0)).collect(),
        }
    }
}

pub struct HistogramVec {
    bounds: Vec<f64>,
    map: DashMap<LabelKey, AtomicHistogram>,
}

impl HistogramVec {
    fn new(bounds: Vec<f64>) -> Self {
        Self {
            bounds,
            map: DashMap::new(),
        }
    }

    /// Observe a value and increment cumulative buckets.
    pub fn observe(&self, labels: &[(&str, &str)], v: f64) {
        let n = self.bounds.len();
        let hist = self.map.entry(label_key(labels, Some(BUCKET_LABEL))).or_insert_with(|| AtomicHistogram::new(n));

        hist.count.fetch_add(1, Ordering::Relaxed);
        let _ = hist.sum.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
            Some((f64::from_bits(bits) + v).to_bits())
        });

        // Cumulative buckets: increment every bucket whose bound covers the value.
        for (i, &b) in self.bounds.iter().enumerate() {
            if v <= b {
                hist.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Observe a duration in seconds.
    pub fn observe_duration(&self, labels: &[(&str, &str)], d: Duration) {
        self.observe(labels, d.as_secs_f64());
    }

    /// Number of observations of one series.
    pub fn count(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels, Some(BUCKET_LABEL)))
            .map(|h| h.count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, defaults: &[(String, String)], out: &mut String) {
        for key in sorted_keys(&self.map) {
            let Some(r) = self.map.get(&key) else { continue };
            let hist = r.value();

            for (i, &le) in self.bounds.iter().enumerate() {
                let count = hist.buckets[i].load(Ordering::Relaxed);
                let labels = label_block(defaults, &key, Some(&fmt_value(le)));
                let _ = writeln!(out, "{name}_bucket{labels} {count}");
            }
            let count = hist.count.load(Ordering::Relaxed);
            let _ = writeln!(out, "{}_bucket{} {}", name, label_block(defaults, &key, Some("+Inf")), count);

            let sum = f64::from_bits(hist.sum.load(Ordering::Relaxed));
            let labels = label_block(defaults, &key, None);
            let _ = writeln!(out, "{name}_sum{labels} {}", fmt_value(sum));
            let _ = writeln!(out, "{name}_count{labels} {count}");
        }
    }
}

#[derive(Clone)]
enum Family {
    Counter(Arc<CounterVec>),
    Gauge(Arc<GaugeVec>),
    Histogram(Arc<HistogramVec>),
}

impl Family {
    fn kind(&self) -> &'static str {
        match self {
            Family::Counter(_) => "counter",
            Family::Gauge(_) => "gauge",
            Family::Histogram(_) => "histogram",
        }
    }
}

struct Entry {
    help: String,
    family: Family,
}

/// One registry per process; share it as `Arc<MetricsRegistry>`.
pub struct MetricsRegistry {
    default_labels: Vec<(String, String)>,
    families: DashMap<String, Entry>,
    sampler: Mutex<Option<JoinHandle<()>>>,
}

impl MetricsRegistry {
    /// Registry whose samples all carry `service=<service_name>`.
    pub fn new(service_name: &str) -> Self {
        Self {
            default_labels: vec![("service".to_string(), service_name.to_string())],
            families: DashMap::new(),
            sampler: Mutex::new(None),
        }
    }

    /// Registry with an arbitrary default label set.
    pub fn with_default_labels(labels: &[(&str, &str)]) -> Result<Self> {
        if let Some((bad, _)) = labels
            .iter()
            .find(|(k, _)| !is_valid_label_name(k) || k.starts_with("__") || *k == BUCKET_LABEL)
        {
            return Err(BootwireError::Configuration(format!("invalid label name: {bad:?}")));
        }
        Ok(Self {
            default_labels: label_key(labels, None),
            families: DashMap::new(),
            sampler: Mutex::new(None),
        })
    }

    pub fn default_labels(&self) -> &[(String, String)] {
        &self.default_labels
    }

    pub fn counter(&self, name: &str, help: &str) -> Result<Arc<CounterVec>> {
        let entry = self.register(name, help, || Family::Counter(Arc::default()))?;
        match entry {
            Family::Counter(c) => Ok(c),
            other => Err(already_registered(name, &other)),
        }
    }

    pub fn gauge(&self, name: &str, help: &str) -> Result<Arc<GaugeVec>> {
        let entry = self.register(name, help, || Family::Gauge(Arc::default()))?;
        match entry {
            Family::Gauge(g) => Ok(g),
            other => Err(already_registered(name, &other)),
        }
    }

    /// `buckets` are upper bounds; they are sorted and deduplicated. An empty
    /// slice selects [`DEFAULT_BUCKETS`].
    pub fn histogram(&self, name: &str, help: &str, buckets: &[f64]) -> Result<Arc<HistogramVec>> {
        let mut bounds: Vec<f64> = if buckets.is_empty() {
            DEFAULT_BUCKETS.to_vec()
        } else {
            buckets.iter().copied().filter(|b| b.is_finite()).collect()
        };
        bounds.sort_by(f64::total_cmp);
        bounds.dedup();

        let entry = self.register(name, help, || Family::Histogram(Arc::new(HistogramVec::new(bounds))))?;
        match entry {
            Family::Histogram(h) => Ok(h),
            other => Err(already_registered(name, &other)),
        }
    }

    fn register(&self, name: &str, help: &str, make: impl FnOnce() -> Family) -> Result<Family> {
        if !is_valid_metric_name(name) {
            return Err(BootwireError::Configuration(format!("invalid metric name: {name:?}")));
        }
        let entry = self.families.entry(name.to_string()).or_insert_with(|| Entry {
            help: help.to_string(),
            family: make(),
        });
        Ok(entry.family.clone())
    }

    /// Names of every registered family, sorted.
    pub fn family_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.families.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Render all registered families in Prometheus text exposition format.
    /// Read-only: never creates series or families.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for name in self.family_names() {
            let Some(entry) = self.families.get(&name) else { continue };
            let _ = writeln!(out, "# HELP {} {}", name, escape_help(&entry.help));
            let _ = writeln!(out, "# TYPE {} {}", name, entry.family.kind());
            match &entry.family {
                Family::Counter(c) => c.render(&name, &self.default_labels, &mut out),
                Family::Gauge(g) => g.render(&name, &self.default_labels, &mut out),
                Family::Histogram(h) => h.render(&name, &self.default_labels, &mut out),
            }
        }
        out
    }

    pub(crate) fn attach_sampler(&self, task: JoinHandle<()>) {
        if let Ok(mut slot) = self.sampler.lock() {
            if let Some(prev) = slot.replace(task) {
                prev.abort();
            }
        } else {
            task.abort();
        }
    }

    /// Stop the background process sampler, if any.
    pub fn stop_sampling(&self) {
        if let Ok(mut slot) = self.sampler.lock() {
            if let Some(task) = slot.take() {
                task.abort();
                tracing::debug!("process metrics sampler stopped");
            }
        }
    }

    pub fn is_sampling(&self) -> bool {
        self.sampler
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|t| !t.is_finished()))
            .unwrap_or(false)
    }
}

impl Drop for MetricsRegistry {
    fn drop(&mut self) {
        self.stop_sampling();
    }
}

fn already_registered(name: &str, existing: &Family) -> BootwireError {
    BootwireError::Configuration(format!(
        "metric {name} already registered as {}",
        existing.kind()
    ))
}

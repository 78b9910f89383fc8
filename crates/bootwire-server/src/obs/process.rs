//! Process-level metrics sampled on a fixed interval.
//!
//! CPU, memory and open handles come from `sysinfo` (open handles are only
//! reported on Linux). Scheduler lag is how late the sampler wakes up
//! compared to its interval.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use bootwire_core::error::Result;

use super::metrics::{CounterVec, GaugeVec, MetricsRegistry};

pub struct ProcessCollector {
    cpu: Arc<GaugeVec>,
    cpu_seconds: Arc<CounterVec>,
    resident: Arc<GaugeVec>,
    virtual_mem: Arc<GaugeVec>,
    uptime: Arc<GaugeVec>,
    open_fds: Option<Arc<GaugeVec>>,
    lag: Arc<GaugeVec>,
    workers: Arc<GaugeVec>,
    alive_tasks: Arc<GaugeVec>,
    system: System,
    pid: Option<Pid>,
    started: Instant,
}

impl ProcessCollector {
    /// Register the process families in `registry`.
    pub fn register(registry: &MetricsRegistry) -> Result<Self> {
        let start_time = registry.gauge(
            "process_start_time_seconds",
            "Start time of the process since unix epoch in seconds.",
        )?;
        let started_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        start_time.set(&[], started_at);

        let open_fds = if cfg!(target_os = "linux") {
            Some(registry.gauge("process_open_fds", "Number of open file descriptors.")?)
        } else {
            None
        };

        Ok(Self {
            cpu: registry.gauge(
                "process_cpu_usage_percent",
                "CPU usage of the process since the previous sample, in percent of one core.",
            )?,
            cpu_seconds: registry.counter(
                "process_cpu_seconds_total",
                "Total user and system CPU time spent in seconds.",
            )?,
            resident: registry.gauge("process_resident_memory_bytes", "Resident memory size in bytes.")?,
            virtual_mem: registry.gauge("process_virtual_memory_bytes", "Virtual memory size in bytes.")?,
            uptime: registry.gauge("process_uptime_seconds", "Seconds since the metrics registry was created.")?,
            open_fds,
            lag: registry.gauge(
                "runtime_scheduler_lag_seconds",
                "How late the sampler woke up relative to its interval.",
            )?,
            workers: registry.gauge("runtime_workers", "Number of async runtime worker threads.")?,
            alive_tasks: registry.gauge("runtime_alive_tasks", "Number of alive async runtime tasks.")?,
            system: System::new(),
            pid: sysinfo::get_current_pid().ok(),
            started: Instant::now(),
        })
    }

    /// Take one sample. `lag` is the scheduler delay measured by the caller.
    pub fn sample(&mut self, lag: Duration) {
        if let Some(pid) = self.pid {
            self.system.refresh_processes_specifics(
                ProcessesToUpdate::Some(&[pid]),
                true,
                ProcessRefreshKind::nothing().with_cpu().with_memory(),
            );
            if let Some(p) = self.system.process(pid) {
                self.cpu.set(&[], f64::from(p.cpu_usage()));
                self.cpu_seconds.advance_to(&[], p.accumulated_cpu_time() as f64 / 1000.0);
                self.resident.set(&[], p.memory() as f64);
                self.virtual_mem.set(&[], p.virtual_memory() as f64);
                if let (Some(fds), Some(n)) = (&self.open_fds, p.open_files()) {
                    fds.set(&[], n as f64);
                }
            }
        }

        self.uptime.set(&[], self.started.elapsed().as_secs_f64());
        self.lag.set(&[], lag.as_secs_f64());

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let m = handle.metrics();
            self.workers.set(&[], m.num_workers() as f64);
            self.alive_tasks.set(&[], m.num_alive_tasks() as f64);
        }
    }
}

/// Register process metrics, take an initial sample, and spawn the periodic
/// sampler when a tokio runtime is available. The task holds only a weak
/// reference and exits once the registry is gone.
pub fn start(registry: &Arc<MetricsRegistry>, interval: Duration) -> Result<()> {
    let mut collector = ProcessCollector::register(registry)?;
    collector.sample(Duration::ZERO);

    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        tracing::debug!("no async runtime; process metrics sampled once");
        return Ok(());
    };

    let weak: Weak<MetricsRegistry> = Arc::downgrade(registry);
    let task = handle.spawn(async move {
        loop {
            let before = Instant::now();
            tokio::time::sleep(interval).await;
            let lag = before.elapsed().saturating_sub(interval);

            if weak.strong_count() == 0 {
                break;
            }
            collector.sample(lag);
        }
    });
    registry.attach_sampler(task);

    tracing::debug!(interval_ms = interval.as_millis() as u64, "process metrics sampler started");
    Ok(())
}

// Host-wide CPU and memory via sysinfo

use crate::models::SystemAggregate;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use sysinfo::System;
use tracing::instrument;

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

pub struct SysinfoRepo {
    sys: Arc<Mutex<System>>,
    last_cpu_refresh: Arc<Mutex<Option<(Instant, f64)>>>,
}

impl Default for SysinfoRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoRepo {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        Self {
            sys: Arc::new(Mutex::new(sys)),
            last_cpu_refresh: Arc::new(Mutex::new(None)),
        }
    }

    /// Current host CPU% and memory. The first call only primes the CPU counters and reports 0.0.
    #[instrument(skip(self), fields(repo = "sysinfo", operation = "sample"))]
    pub async fn sample(&self) -> anyhow::Result<SystemAggregate> {
        let sys = self.sys.clone();
        let last_cpu_refresh = self.last_cpu_refresh.clone();
        tokio::task::spawn_blocking(move || {
            let mut sys = sys
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo lock poisoned: {}", e))?;
            let mut last = last_cpu_refresh
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo cpu cache lock poisoned: {}", e))?;

            let now = Instant::now();
            let cached = *last;
            let cpu_percent = match cached {
                Some((prev_ts, prev_usage))
                    if now.duration_since(prev_ts) < sysinfo::MINIMUM_CPU_UPDATE_INTERVAL =>
                {
                    prev_usage
                }
                Some(_) => {
                    sys.refresh_cpu_all();
                    let usage = sys.global_cpu_usage() as f64;
                    *last = Some((now, usage));
                    usage
                }
                None => {
                    sys.refresh_cpu_all();
                    *last = Some((now, 0.0));
                    0.0
                }
            };

            sys.refresh_memory();
            let total = sys.total_memory();
            let used = total.saturating_sub(sys.available_memory());
            let memory_percent = if total > 0 {
                (used as f64 / total as f64) * 100.0
            } else {
                0.0
            };

            Ok(SystemAggregate {
                cpu_percent: cpu_percent.clamp(0.0, 100.0),
                memory_percent,
                memory_used_gb: used as f64 / BYTES_PER_GIB,
                memory_total_gb: total as f64 / BYTES_PER_GIB,
            })
        })
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?
    }
}

// Shared test helpers
#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use loadwatch::context::{OutputPaths, RunContext};
use loadwatch::docker_repo::StatsSource;
use loadwatch::models::*;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

pub fn record(name: &str, cpu_percent: f64, memory_mb: f64, pids: u64) -> MetricRecord {
    MetricRecord {
        name: name.into(),
        cpu_percent,
        memory_mb,
        memory_percent: None,
        pids,
        status: "running".into(),
    }
}

pub fn system(cpu_percent: f64, memory_percent: f64) -> SystemAggregate {
    SystemAggregate {
        cpu_percent,
        memory_percent,
        memory_used_gb: 4.0,
        memory_total_gb: 16.0,
    }
}

pub fn counters(name: &str, cpu: u64, system_cpu: u64, cores: u32) -> RawStatSnapshot {
    RawStatSnapshot::counter_based(
        name,
        CounterStats {
            cpu_total_usage: cpu,
            system_cpu_usage: system_cpu,
            online_cpus: cores,
            memory_usage_bytes: 64 * 1024 * 1024,
            memory_limit_bytes: Some(256 * 1024 * 1024),
            pids: 3,
        },
    )
}

pub fn formatted(name: &str, cpu: &str, mem: &str, pids: &str) -> RawStatSnapshot {
    RawStatSnapshot::pre_formatted(
        name,
        FormattedStats {
            cpu_perc: cpu.into(),
            mem_usage: mem.into(),
            mem_perc: None,
            pids: pids.into(),
        },
    )
}

pub fn test_context(dir: &Path, interval: Duration) -> RunContext {
    RunContext::new(
        "base",
        "10",
        interval,
        OutputPaths::new(dir, "base", "10", at(12, 0, 0)),
    )
}

/// Hands out pre-recorded polls in order, then empty polls. Optionally requests a stop
/// while serving the Nth poll.
pub struct ScriptedSource {
    polls: Mutex<VecDeque<Vec<RawStatSnapshot>>>,
    served: AtomicUsize,
    stop_after: Option<(usize, CancellationToken)>,
}

impl ScriptedSource {
    pub fn new(polls: Vec<Vec<RawStatSnapshot>>) -> Self {
        Self {
            polls: Mutex::new(polls.into()),
            served: AtomicUsize::new(0),
            stop_after: None,
        }
    }

    pub fn stop_after(mut self, polls: usize, token: CancellationToken) -> Self {
        self.stop_after = Some((polls, token));
        self
    }
}

impl StatsSource for ScriptedSource {
    async fn poll(&self) -> Vec<RawStatSnapshot> {
        let next = self.polls.lock().unwrap().pop_front().unwrap_or_default();
        let served = self.served.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((n, token)) = &self.stop_after
            && served == *n
        {
            token.cancel();
        }
        next
    }
}

pub fn read_timeseries(path: &Path) -> Vec<Sample> {
    let raw = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&raw).unwrap()
}

// Raw runtime stats -> MetricRecord.
// Counter-based CPU% is computed against the previous poll of the same entity; that
// previous-counter cache is the only state kept here.

use crate::models::{CounterStats, FormattedStats, MetricRecord, RawStatSnapshot, RawStats};
use std::collections::{HashMap, HashSet};
use tracing::warn;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Default)]
pub struct Normalizer {
    previous: HashMap<String, CounterStats>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalize(&mut self, snapshot: RawStatSnapshot) -> MetricRecord {
        let RawStatSnapshot {
            name,
            status,
            stats,
        } = snapshot;
        match stats {
            RawStats::PreFormatted(f) => from_formatted(name, status, &f),
            RawStats::CounterBased(c) => {
                let prior = self.previous.insert(name.clone(), c);
                from_counters(name, status, &c, prior.as_ref())
            }
        }
    }

    /// Normalizes one whole poll. A name repeated within the poll keeps its first snapshot,
    /// both in the output and in the prior-counter cache. Entities missing from this poll
    /// are forgotten, so a container that comes back starts over without a prior snapshot.
    pub fn normalize_poll(&mut self, snapshots: Vec<RawStatSnapshot>) -> Vec<MetricRecord> {
        let mut seen: HashSet<String> = HashSet::with_capacity(snapshots.len());
        let mut records = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            if !seen.insert(snapshot.name.clone()) {
                warn!(entity = %snapshot.name, "duplicate entity in poll; keeping the first");
                continue;
            }
            records.push(self.normalize(snapshot));
        }
        self.previous.retain(|name, _| seen.contains(name));
        records
    }

    pub fn tracked_entities(&self) -> usize {
        self.previous.len()
    }
}

fn from_formatted(name: String, status: String, f: &FormattedStats) -> MetricRecord {
    let (used, limit) = split_mem_usage(&f.mem_usage);
    let memory_mb = parse_memory_mib(used).unwrap_or(0.0);
    let memory_percent = f
        .mem_perc
        .as_deref()
        .and_then(parse_percent)
        .or_else(|| {
            let limit = limit.and_then(parse_memory_mib).filter(|l| *l > 0.0)?;
            Some(memory_mb / limit * 100.0)
        });
    MetricRecord {
        name,
        cpu_percent: parse_percent(&f.cpu_perc).unwrap_or(0.0).max(0.0),
        memory_mb,
        memory_percent,
        pids: parse_count(&f.pids),
        status,
    }
}

fn from_counters(
    name: String,
    status: String,
    current: &CounterStats,
    prior: Option<&CounterStats>,
) -> MetricRecord {
    let cpu_percent = prior.map_or(0.0, |p| cpu_percent_from_delta(p, current));
    let usage = current.memory_usage_bytes as f64;
    let memory_percent = current
        .memory_limit_bytes
        .filter(|l| *l > 0)
        .map(|l| usage / l as f64 * 100.0);
    MetricRecord {
        name,
        cpu_percent,
        memory_mb: usage / BYTES_PER_MIB,
        memory_percent,
        pids: current.pids,
        status,
    }
}

/// `(cpu_delta / system_delta) × online_cpus × 100`; 0.0 unless both deltas are positive.
pub fn cpu_percent_from_delta(prior: &CounterStats, current: &CounterStats) -> f64 {
    let cpu_delta = current.cpu_total_usage as i128 - prior.cpu_total_usage as i128;
    let system_delta = current.system_cpu_usage as i128 - prior.system_cpu_usage as i128;
    if cpu_delta <= 0 || system_delta <= 0 {
        return 0.0;
    }
    let online = current.online_cpus.max(1) as f64;
    (cpu_delta as f64 / system_delta as f64) * online * 100.0
}

/// Splits `"25.1MiB / 1.944GiB"` into used and (if present) limit.
fn split_mem_usage(s: &str) -> (&str, Option<&str>) {
    match s.split_once('/') {
        Some((used, limit)) => (used.trim(), Some(limit.trim())),
        None => (s.trim(), None),
    }
}

/// `"12.5%"` -> 12.5. Runtime placeholders such as `"--"` give `None`.
pub fn parse_percent(s: &str) -> Option<f64> {
    s.trim()
        .trim_end_matches('%')
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Converts a size with unit suffix to MiB. A bare number is bytes.
pub fn parse_memory_mib(s: &str) -> Option<f64> {
    let s = s.trim();
    let split = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let value: f64 = number.parse().ok().filter(|v: &f64| v.is_finite())?;
    let mib = match unit.trim() {
        "TiB" => value * 1024.0 * 1024.0,
        "GiB" => value * 1024.0,
        "MiB" => value,
        "KiB" => value / 1024.0,
        "" | "B" => value / BYTES_PER_MIB,
        "TB" => value * 1e12 / BYTES_PER_MIB,
        "GB" => value * 1e9 / BYTES_PER_MIB,
        "MB" => value * 1e6 / BYTES_PER_MIB,
        "kB" | "KB" => value * 1e3 / BYTES_PER_MIB,
        _ => return None,
    };
    Some(mib.max(0.0))
}

fn parse_count(s: &str) -> u64 {
    let s = s.trim();
    s.parse::<u64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().filter(|v| *v >= 0.0).map(|v| v as u64))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_units_convert_to_mib() {
        assert_eq!(parse_memory_mib("2GiB"), Some(2048.0));
        assert_eq!(parse_memory_mib("2 GiB"), Some(2048.0));
        assert_eq!(parse_memory_mib("512KiB"), Some(0.5));
        assert_eq!(parse_memory_mib("1048576"), Some(1.0));
        assert_eq!(parse_memory_mib("1048576B"), Some(1.0));
        assert_eq!(parse_memory_mib("25.5MiB"), Some(25.5));
        assert_eq!(parse_memory_mib("1TiB"), Some(1024.0 * 1024.0));
    }

    #[test]
    fn unparseable_memory_is_none() {
        assert_eq!(parse_memory_mib(""), None);
        assert_eq!(parse_memory_mib("--"), None);
        assert_eq!(parse_memory_mib("12furlongs"), None);
    }

    #[test]
    fn percent_strips_sign() {
        assert_eq!(parse_percent("12.34%"), Some(12.34));
        assert_eq!(parse_percent(" 0.00% "), Some(0.0));
        assert_eq!(parse_percent("--"), None);
        assert_eq!(parse_percent(""), None);
    }

    #[test]
    fn count_accepts_integer_strings() {
        assert_eq!(parse_count("7"), 7);
        assert_eq!(parse_count(" 12 "), 12);
        assert_eq!(parse_count("3.0"), 3);
        assert_eq!(parse_count("--"), 0);
        assert_eq!(parse_count("-4"), 0);
    }

    #[test]
    fn split_handles_missing_limit() {
        assert_eq!(split_mem_usage("1MiB / 2GiB"), ("1MiB", Some("2GiB")));
        assert_eq!(split_mem_usage("1MiB"), ("1MiB", None));
    }
}

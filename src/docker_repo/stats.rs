// Extract cumulative counters from a Docker Engine stats response.

use crate::models::CounterStats;
use bollard::models::ContainerStatsResponse;

/// Pulls the counters the normalizer needs. `None` when the response has no CPU section
/// (container stopping, or a runtime that does not report it).
pub(crate) fn counters_from_response(s: &ContainerStatsResponse) -> Option<CounterStats> {
    let cpu_stats = s.cpu_stats.as_ref()?;
    let cpu_usage = cpu_stats.cpu_usage.as_ref()?;

    let online_cpus = cpu_stats
        .online_cpus
        .filter(|n| *n > 0)
        .or_else(|| {
            cpu_usage
                .percpu_usage
                .as_ref()
                .map(|p| p.len() as u32)
                .filter(|n| *n > 0)
        })
        .unwrap_or(1);

    let memory = s.memory_stats.as_ref();
    let memory_usage_bytes = memory.and_then(|m| m.usage).unwrap_or(0);
    let memory_limit_bytes = memory.and_then(|m| m.limit).filter(|l| *l > 0);

    let pids = s.pids_stats.as_ref().and_then(|p| p.current).unwrap_or(0);

    Some(CounterStats {
        cpu_total_usage: cpu_usage.total_usage.unwrap_or(0),
        system_cpu_usage: cpu_stats.system_cpu_usage.unwrap_or(0),
        online_cpus,
        memory_usage_bytes,
        memory_limit_bytes,
        pids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::{
        ContainerCpuStats, ContainerCpuUsage, ContainerMemoryStats, ContainerPidsStats,
        ContainerStatsResponse,
    };

    fn cpu_stats(
        total_usage: u64,
        system_cpu_usage: u64,
        online: Option<u32>,
    ) -> ContainerCpuStats {
        ContainerCpuStats {
            cpu_usage: Some(ContainerCpuUsage {
                total_usage: Some(total_usage),
                percpu_usage: Some(vec![0, 0, 0, 0]),
                ..Default::default()
            }),
            system_cpu_usage: Some(system_cpu_usage),
            online_cpus: online,
            throttling_data: None,
        }
    }

    #[test]
    fn returns_none_when_cpu_stats_missing() {
        let s = ContainerStatsResponse {
            cpu_stats: None,
            ..Default::default()
        };
        assert!(counters_from_response(&s).is_none());
    }

    #[test]
    fn extracts_counters_memory_and_pids() {
        let s = ContainerStatsResponse {
            cpu_stats: Some(cpu_stats(100_000_000, 1_000_000_000, Some(2))),
            memory_stats: Some(ContainerMemoryStats {
                usage: Some(256 * 1024 * 1024),
                limit: Some(512 * 1024 * 1024),
                ..Default::default()
            }),
            pids_stats: Some(ContainerPidsStats {
                current: Some(5),
                ..Default::default()
            }),
            ..Default::default()
        };
        let out = counters_from_response(&s).unwrap();
        assert_eq!(out.cpu_total_usage, 100_000_000);
        assert_eq!(out.system_cpu_usage, 1_000_000_000);
        assert_eq!(out.online_cpus, 2);
        assert_eq!(out.memory_usage_bytes, 256 * 1024 * 1024);
        assert_eq!(out.memory_limit_bytes, Some(512 * 1024 * 1024));
        assert_eq!(out.pids, 5);
    }

    #[test]
    fn online_cpus_falls_back_to_percpu_len() {
        let s = ContainerStatsResponse {
            cpu_stats: Some(cpu_stats(1, 1, None)),
            ..Default::default()
        };
        assert_eq!(counters_from_response(&s).unwrap().online_cpus, 4);
    }

    #[test]
    fn zero_memory_limit_is_absent() {
        let s = ContainerStatsResponse {
            cpu_stats: Some(cpu_stats(1, 1, Some(1))),
            memory_stats: Some(ContainerMemoryStats {
                usage: Some(1024),
                limit: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let out = counters_from_response(&s).unwrap();
        assert_eq!(out.memory_limit_bytes, None);
        assert_eq!(out.pids, 0);
    }
}

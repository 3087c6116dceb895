// Raw per-container stats as delivered by a runtime backend, before normalization

/// One entity's stats at one poll. Discarded once normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStatSnapshot {
    pub name: String,
    pub status: String,
    pub stats: RawStats,
}

/// The two shapes a runtime can hand us.
#[derive(Debug, Clone, PartialEq)]
pub enum RawStats {
    /// Human-formatted strings, as printed by `docker stats`.
    PreFormatted(FormattedStats),
    /// Cumulative counters from the Engine API; CPU% needs the previous poll.
    CounterBased(CounterStats),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormattedStats {
    /// e.g. "12.34%"
    pub cpu_perc: String,
    /// e.g. "25.1MiB / 1.944GiB"
    pub mem_usage: String,
    /// e.g. "1.26%"; not every backend reports it.
    pub mem_perc: Option<String>,
    pub pids: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterStats {
    /// Cumulative container CPU time (ns).
    pub cpu_total_usage: u64,
    /// Cumulative host CPU time (ns).
    pub system_cpu_usage: u64,
    pub online_cpus: u32,
    pub memory_usage_bytes: u64,
    /// `None` when the runtime reports no limit (or 0).
    pub memory_limit_bytes: Option<u64>,
    pub pids: u64,
}

impl RawStatSnapshot {
    pub fn pre_formatted(name: impl Into<String>, stats: FormattedStats) -> Self {
        Self {
            name: name.into(),
            status: "running".into(),
            stats: RawStats::PreFormatted(stats),
        }
    }

    pub fn counter_based(name: impl Into<String>, stats: CounterStats) -> Self {
        Self {
            name: name.into(),
            status: "running".into(),
            stats: RawStats::CounterBased(stats),
        }
    }
}

// End-of-session aggregate statistics

/// Mean and max of one metric over a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanMax {
    pub mean: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntitySummary {
    pub name: String,
    /// Number of samples the entity appeared in.
    pub samples: usize,
    pub cpu_percent: MeanMax,
    pub memory_mb: MeanMax,
    pub pids: MeanMax,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemSummary {
    /// Number of samples that carried a system aggregate.
    pub samples: usize,
    pub cpu_percent: MeanMax,
    pub memory_percent: MeanMax,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryStats {
    pub sample_count: usize,
    /// `sample_count × interval`, in seconds.
    pub elapsed_secs: f64,
    pub system: Option<SystemSummary>,
    /// Sorted by entity name.
    pub entities: Vec<EntitySummary>,
}

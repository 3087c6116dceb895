// Canonical per-entity metric record

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub name: String,
    pub cpu_percent: f64,
    pub memory_mb: f64,
    /// Omitted when the memory limit is unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_percent: Option<f64>,
    pub pids: u64,
    pub status: String,
}

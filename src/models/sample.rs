// One poll cycle: timestamp, per-entity records, optional host aggregate

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::MetricRecord;

/// Timestamp layout used on disk and in the CSV.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Host-wide usage captured alongside the per-entity records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SystemAggregate {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_used_gb: f64,
    pub memory_total_gb: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemAggregate>,
    /// Sorted by name, each name at most once.
    pub samples: Vec<MetricRecord>,
}

impl Sample {
    /// Builds a sample, ordering records by name. On duplicate names the first record wins.
    pub fn new(
        timestamp: NaiveDateTime,
        records: Vec<MetricRecord>,
        system: Option<SystemAggregate>,
    ) -> Self {
        let mut by_name: BTreeMap<String, MetricRecord> = BTreeMap::new();
        for record in records {
            if by_name.contains_key(&record.name) {
                tracing::warn!(entity = %record.name, "duplicate entity in poll; keeping first");
                continue;
            }
            by_name.insert(record.name.clone(), record);
        }
        Self {
            timestamp,
            system,
            samples: by_name.into_values().collect(),
        }
    }

    pub fn entity(&self, name: &str) -> Option<&MetricRecord> {
        self.samples
            .binary_search_by(|r| r.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.samples[i])
    }

    pub fn timestamp_string(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}

mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIMESTAMP_FORMAT;

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&ts.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
    }
}

// Domain models

mod metric;
mod raw;
mod sample;
mod summary;

pub use metric::MetricRecord;
pub use raw::{CounterStats, FormattedStats, RawStatSnapshot, RawStats};
pub use sample::{Sample, SystemAggregate, TIMESTAMP_FORMAT};
pub use summary::{EntitySummary, MeanMax, SummaryStats, SystemSummary};

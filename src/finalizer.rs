// End-of-session artifacts: flushed time series, flat CSV table, text summary.

use crate::context::RunContext;
use crate::error::WriteError;
use crate::models::{EntitySummary, MeanMax, Sample, SummaryStats, SystemSummary};
use crate::sample_buffer::{SampleBuffer, write_atomically};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

const TABLE_HEADER: [&str; 7] = [
    "timestamp",
    "system_cpu",
    "system_memory",
    "entity",
    "entity_cpu",
    "entity_memory_mb",
    "entity_pids",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Artifacts {
    pub timeseries: PathBuf,
    pub tabular: PathBuf,
    pub summary: PathBuf,
    pub stats: SummaryStats,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FinalizeOutcome {
    /// No sample was collected; nothing was written.
    NothingToSave,
    Saved(Artifacts),
}

/// Flushes the time series and writes the table and the summary. With an empty buffer
/// nothing is written.
pub fn finalize(
    buffer: &mut SampleBuffer,
    ctx: &RunContext,
    generated_at: NaiveDateTime,
) -> Result<FinalizeOutcome, WriteError> {
    if buffer.is_empty() {
        info!("no samples collected; nothing to save");
        return Ok(FinalizeOutcome::NothingToSave);
    }

    let stats = compute_summary(buffer.samples(), ctx.interval);
    let text = render_summary(&stats, ctx, generated_at);

    // Each artifact is attempted; the first failure is reported.
    let results = [
        ("final_flush", buffer.flush()),
        (
            "write_tabular",
            write_tabular(&ctx.paths.tabular, buffer.samples()),
        ),
        (
            "write_summary",
            write_atomically(&ctx.paths.summary, text.as_bytes()),
        ),
    ];
    let mut first_error = None;
    for (operation, result) in results {
        if let Err(e) = result {
            warn!(error = %e, operation, "artifact write failed");
            if first_error.is_none() {
                first_error = Some(e);
            }
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }

    Ok(FinalizeOutcome::Saved(Artifacts {
        timeseries: buffer.path().to_path_buf(),
        tabular: ctx.paths.tabular.clone(),
        summary: ctx.paths.summary.clone(),
        stats,
    }))
}

#[derive(Serialize)]
struct TableRow<'a> {
    timestamp: &'a str,
    system_cpu: Option<f64>,
    system_memory: Option<f64>,
    entity: &'a str,
    entity_cpu: f64,
    entity_memory_mb: f64,
    entity_pids: u64,
}

/// One row per (sample, entity). System columns are empty when the sample has no aggregate.
pub fn render_tabular(samples: &[Sample]) -> Result<Vec<u8>, WriteError> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    wtr.write_record(TABLE_HEADER)?;
    for sample in samples {
        let timestamp = sample.timestamp_string();
        for record in &sample.samples {
            wtr.serialize(TableRow {
                timestamp: &timestamp,
                system_cpu: sample.system.map(|s| round2(s.cpu_percent)),
                system_memory: sample.system.map(|s| round2(s.memory_percent)),
                entity: &record.name,
                entity_cpu: round2(record.cpu_percent),
                entity_memory_mb: round2(record.memory_mb),
                entity_pids: record.pids,
            })?;
        }
    }
    wtr.into_inner()
        .map_err(|e| WriteError::Csv(csv::Error::from(e.into_error())))
}

fn write_tabular(path: &Path, samples: &[Sample]) -> Result<(), WriteError> {
    let bytes = render_tabular(samples)?;
    write_atomically(path, &bytes)
}

#[derive(Default)]
struct EntityAcc {
    cpu: Vec<f64>,
    memory: Vec<f64>,
    pids: Vec<f64>,
}

/// Full pass over the samples; the result depends only on `samples` and `interval`.
pub fn compute_summary(samples: &[Sample], interval: Duration) -> SummaryStats {
    let mut system_cpu = Vec::new();
    let mut system_mem = Vec::new();
    let mut entities: BTreeMap<&str, EntityAcc> = BTreeMap::new();

    for sample in samples {
        if let Some(sys) = &sample.system {
            system_cpu.push(sys.cpu_percent);
            system_mem.push(sys.memory_percent);
        }
        for record in &sample.samples {
            let acc = entities.entry(record.name.as_str()).or_default();
            acc.cpu.push(record.cpu_percent);
            acc.memory.push(record.memory_mb);
            acc.pids.push(record.pids as f64);
        }
    }

    let system = (!system_cpu.is_empty()).then(|| SystemSummary {
        samples: system_cpu.len(),
        cpu_percent: mean_max(&system_cpu),
        memory_percent: mean_max(&system_mem),
    });

    let entities = entities
        .into_iter()
        .map(|(name, acc)| EntitySummary {
            name: name.to_string(),
            samples: acc.cpu.len(),
            cpu_percent: mean_max(&acc.cpu),
            memory_mb: mean_max(&acc.memory),
            pids: mean_max(&acc.pids),
        })
        .collect();

    SummaryStats {
        sample_count: samples.len(),
        elapsed_secs: samples.len() as f64 * interval.as_secs_f64(),
        system,
        entities,
    }
}

pub fn render_summary(
    stats: &SummaryStats,
    ctx: &RunContext,
    generated_at: NaiveDateTime,
) -> String {
    let rule = "=".repeat(60);
    let sub = "-".repeat(30);
    let mut out = String::new();

    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "CONTAINER RESOURCE SUMMARY");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Architecture: {}", ctx.arch);
    let _ = writeln!(out, "Users: {}", ctx.users);
    let _ = writeln!(out, "Samples: {}", stats.sample_count);
    let _ = writeln!(out, "Interval: {:.1}s", ctx.interval.as_secs_f64());
    let _ = writeln!(out, "Duration: ~{:.1} minutes", stats.elapsed_secs / 60.0);
    let _ = writeln!(out, "Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out);

    if let Some(sys) = &stats.system {
        let _ = writeln!(out, "SYSTEM METRICS");
        let _ = writeln!(out, "{sub}");
        let _ = writeln!(
            out,
            "CPU Usage: {:.1}% avg, {:.1}% max",
            sys.cpu_percent.mean, sys.cpu_percent.max
        );
        let _ = writeln!(
            out,
            "Memory Usage: {:.1}% avg, {:.1}% max",
            sys.memory_percent.mean, sys.memory_percent.max
        );
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "CONTAINER METRICS");
    let _ = writeln!(out, "{sub}");
    if stats.entities.is_empty() {
        let _ = writeln!(out, "(no containers observed)");
    }
    for e in &stats.entities {
        let _ = writeln!(out, "{} ({} samples):", e.name, e.samples);
        let _ = writeln!(
            out,
            "  CPU: {:.1}% avg, {:.1}% max",
            e.cpu_percent.mean, e.cpu_percent.max
        );
        let _ = writeln!(
            out,
            "  Memory: {:.1}MB avg, {:.1}MB max",
            e.memory_mb.mean, e.memory_mb.max
        );
        let _ = writeln!(
            out,
            "  PIDs: {:.1} avg, {} max",
            e.pids.mean, e.pids.max as u64
        );
        let _ = writeln!(out);
    }
    out
}

fn mean_max(values: &[f64]) -> MeanMax {
    if values.is_empty() {
        return MeanMax { mean: 0.0, max: 0.0 };
    }
    MeanMax {
        mean: values.iter().sum::<f64>() / values.len() as f64,
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

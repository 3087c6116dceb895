// Sampling session: fixed-interval poll -> normalize -> append, then finalize once.
// A stop request is honoured at the top of each cycle and while waiting for the next tick;
// a poll or write already underway always completes.

use crate::context::RunContext;
use crate::docker_repo::StatsSource;
use crate::error::SessionError;
use crate::finalizer::{self, FinalizeOutcome};
use crate::models::{Sample, SystemAggregate};
use crate::normalizer::Normalizer;
use crate::sample_buffer::SampleBuffer;
use crate::sysinfo_repo::SysinfoRepo;
use chrono::{NaiveDateTime, Timelike};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::Instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// What a finished session left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub samples: usize,
    pub failed_writes: u64,
    pub outcome: FinalizeOutcome,
}

pub struct Session<S> {
    ctx: RunContext,
    source: S,
    system: Option<Arc<SysinfoRepo>>,
    normalizer: Normalizer,
    buffer: SampleBuffer,
    state: watch::Sender<SessionState>,
    last_timestamp: Option<NaiveDateTime>,
    failed_writes: u64,
}

impl<S: StatsSource> Session<S> {
    pub fn new(ctx: RunContext, source: S, system: Option<Arc<SysinfoRepo>>) -> Self {
        let buffer = SampleBuffer::new(ctx.paths.timeseries.clone());
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            ctx,
            source,
            system,
            normalizer: Normalizer::new(),
            buffer,
            state,
            last_timestamp: None,
            failed_writes: 0,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Runs until stopped (or `max_samples` is reached), then finalizes. Consumes the session,
    /// so finalization happens exactly once.
    pub async fn run(self) -> anyhow::Result<SessionReport> {
        let span = tracing::info_span!(
            "session",
            arch = %self.ctx.arch,
            users = %self.ctx.users
        );
        self.run_loop().instrument(span).await
    }

    async fn run_loop(mut self) -> anyhow::Result<SessionReport> {
        let cancel = self.ctx.stop_token();
        let mut tick = interval(self.ctx.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.state.send_replace(SessionState::Running);
        tracing::info!(
            interval_ms = self.ctx.interval.as_millis() as u64,
            output = %self.ctx.paths.timeseries.display(),
            "collection started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {}
            }
            self.collect_once().await;
            if self
                .ctx
                .max_samples
                .is_some_and(|max| self.buffer.len() >= max)
            {
                tracing::info!(samples = self.buffer.len(), "sample limit reached");
                break;
            }
        }

        self.state.send_replace(SessionState::Stopping);
        tracing::info!(samples = self.buffer.len(), "collection stopped");

        let outcome = finalizer::finalize(&mut self.buffer, &self.ctx, local_now());
        self.ctx.stop();
        self.state.send_replace(SessionState::Stopped);

        let samples = self.buffer.len();
        let failed_writes = self.failed_writes;
        match outcome {
            Ok(outcome) => Ok(SessionReport {
                samples,
                failed_writes,
                outcome,
            }),
            Err(source) => {
                tracing::error!(
                    error = %source,
                    samples,
                    failed_writes,
                    "session results could not be saved"
                );
                Err(SessionError {
                    samples,
                    failed_writes,
                    source,
                }
                .into())
            }
        }
    }

    async fn collect_once(&mut self) {
        let timestamp = self.next_timestamp();
        let raw = self.source.poll().await;
        let records = self.normalizer.normalize_poll(raw);
        let system = self.system_aggregate().await;
        let sample = Sample::new(timestamp, records, system);

        log_progress(&sample);

        if let Err(e) = self.buffer.append(sample) {
            self.failed_writes += 1;
            tracing::warn!(
                error = %e,
                operation = "append_sample",
                buffered = self.buffer.len(),
                "time series write failed; keeping samples in memory"
            );
        }
    }

    async fn system_aggregate(&self) -> Option<SystemAggregate> {
        let repo = self.system.as_ref()?;
        match repo.sample().await {
            Ok(s) => Some(s),
            Err(e) => {
                tracing::warn!(error = %e, operation = "system_sample", "system stats failed");
                None
            }
        }
    }

    /// Local time at second resolution, never earlier than the previous sample.
    fn next_timestamp(&mut self) -> NaiveDateTime {
        let now = local_now();
        let ts = match self.last_timestamp {
            Some(prev) if prev > now => prev,
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts
    }
}

fn local_now() -> NaiveDateTime {
    let now = chrono::Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

fn log_progress(sample: &Sample) {
    match &sample.system {
        Some(sys) => tracing::info!(
            timestamp = %sample.timestamp_string(),
            entities = sample.samples.len(),
            system_cpu = %format!("{:.1}%", sys.cpu_percent),
            system_memory = %format!("{:.1}%", sys.memory_percent),
            "sample"
        ),
        None => tracing::info!(
            timestamp = %sample.timestamp_string(),
            entities = sample.samples.len(),
            "sample"
        ),
    }
    for r in &sample.samples {
        tracing::info!(
            entity = %r.name,
            cpu = %format!("{:.1}%", r.cpu_percent),
            memory = %format!("{:.1}MB", r.memory_mb),
            pids = r.pids,
            "container"
        );
    }
}

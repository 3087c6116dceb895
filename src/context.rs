// Per-session state: labels, timing, output locations, stop token

use crate::config::AppConfig;
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Where a session's three artifacts go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub timeseries: PathBuf,
    pub tabular: PathBuf,
    pub summary: PathBuf,
}

impl OutputPaths {
    /// `{dir}/{arch}_{users}users_{YYYYmmdd_HHMMSS}` + `.json`, `.csv`, `_summary.txt`.
    pub fn new(dir: impl AsRef<Path>, arch: &str, users: &str, started_at: NaiveDateTime) -> Self {
        let base = format!(
            "{}_{}users_{}",
            sanitize(arch),
            sanitize(users),
            started_at.format("%Y%m%d_%H%M%S")
        );
        let dir = dir.as_ref();
        Self {
            timeseries: dir.join(format!("{base}.json")),
            tabular: dir.join(format!("{base}.csv")),
            summary: dir.join(format!("{base}_summary.txt")),
        }
    }
}

/// Label characters that would escape the output directory become `_`.
fn sanitize(label: &str) -> String {
    label
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct RunContext {
    pub arch: String,
    pub users: String,
    pub interval: Duration,
    pub max_samples: Option<usize>,
    pub paths: OutputPaths,
    cancel: CancellationToken,
}

impl RunContext {
    pub fn new(
        arch: impl Into<String>,
        users: impl Into<String>,
        interval: Duration,
        paths: OutputPaths,
    ) -> Self {
        Self {
            arch: arch.into(),
            users: users.into(),
            interval,
            max_samples: None,
            paths,
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_config(
        config: &AppConfig,
        arch: &str,
        users: &str,
        started_at: NaiveDateTime,
    ) -> Self {
        let paths = OutputPaths::new(&config.output.dir, arch, users, started_at);
        let mut ctx = Self::new(
            arch,
            users,
            Duration::from_millis(config.sampling.interval_ms),
            paths,
        );
        ctx.max_samples = config.sampling.max_samples;
        ctx
    }

    pub fn with_max_samples(mut self, max_samples: Option<usize>) -> Self {
        self.max_samples = max_samples;
        self
    }

    /// Requests a stop. Calling it again, or after the session ended, does nothing.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopping(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token for signal handlers or other tasks that need to request the stop.
    pub fn stop_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

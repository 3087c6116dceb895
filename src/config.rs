use serde::Deserialize;
use std::path::Path;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Which runtime interface to read container stats from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsBackend {
    /// Docker Engine API (cumulative counters).
    #[default]
    Api,
    /// `docker stats --no-stream` (pre-formatted strings).
    Cli,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplingConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Upper bound for a single runtime call (list, per-container stats, CLI run).
    #[serde(default = "default_runtime_timeout_ms")]
    pub runtime_timeout_ms: u64,
    #[serde(default)]
    pub backend: StatsBackend,
    /// Also sample host-wide CPU and memory each tick.
    #[serde(default = "default_true")]
    pub system_stats: bool,
    /// Stop on its own after this many samples. Unset: run until interrupted.
    #[serde(default)]
    pub max_samples: Option<usize>,
    #[serde(default = "default_docker_binary")]
    pub docker_binary: String,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            runtime_timeout_ms: default_runtime_timeout_ms(),
            backend: StatsBackend::default(),
            system_stats: true,
            max_samples: None,
            docker_binary: default_docker_binary(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_interval_ms() -> u64 {
    5000
}

fn default_runtime_timeout_ms() -> u64 {
    3000
}

fn default_true() -> bool {
    true
}

fn default_docker_binary() -> String {
    "docker".into()
}

fn default_output_dir() -> String {
    "metrics".into()
}

impl AppConfig {
    /// Loads `$CONFIG_FILE`, or `config.toml` if present, or falls back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        match std::env::var("CONFIG_FILE") {
            Ok(path) => Self::load_from_path(&path),
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::load_from_path(DEFAULT_CONFIG_PATH)
            }
            Err(_) => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    fn load_from_path(path: &str) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("read config {}: {}", path, e))?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.sampling.interval_ms > 0,
            "sampling.interval_ms must be > 0, got {}",
            self.sampling.interval_ms
        );
        anyhow::ensure!(
            self.sampling.runtime_timeout_ms > 0,
            "sampling.runtime_timeout_ms must be > 0, got {}",
            self.sampling.runtime_timeout_ms
        );
        if let Some(max) = self.sampling.max_samples {
            anyhow::ensure!(max > 0, "sampling.max_samples must be > 0 when set, got {}", max);
        }
        anyhow::ensure!(
            !self.sampling.docker_binary.is_empty(),
            "sampling.docker_binary must be non-empty"
        );
        anyhow::ensure!(!self.output.dir.is_empty(), "output.dir must be non-empty");
        Ok(())
    }
}

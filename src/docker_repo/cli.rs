// Pre-formatted stats via `docker stats --no-stream --format "{{ json . }}"`

use super::StatsSource;
use crate::models::{FormattedStats, RawStatSnapshot};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::time::Duration;
use tokio::process::Command;
use tracing::{instrument, warn};

pub struct DockerCli {
    binary: String,
    timeout: Duration,
}

/// One line of `docker stats` JSON output. Other keys are ignored.
#[derive(Debug, Deserialize)]
struct StatsLine {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "CPUPerc", default, deserialize_with = "string_or_number")]
    cpu_perc: String,
    #[serde(rename = "MemUsage", default)]
    mem_usage: String,
    #[serde(rename = "MemPerc", default, deserialize_with = "opt_string_or_number")]
    mem_perc: Option<String>,
    #[serde(rename = "PIDs", default, deserialize_with = "string_or_number")]
    pids: String,
}

/// Numeric fields may arrive as `"7"` or `7`; both end up as text for the normalizer.
fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(opt_string_or_number(d)?.unwrap_or_default())
}

fn opt_string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

impl DockerCli {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

impl StatsSource for DockerCli {
    #[instrument(skip(self), fields(repo = "docker_cli", operation = "poll"))]
    async fn poll(&self) -> Vec<RawStatSnapshot> {
        let run = Command::new(&self.binary)
            .args(["stats", "--no-stream", "--format", "{{ json . }}"])
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(o)) => o,
            Ok(Err(e)) => {
                warn!(error = %e, binary = %self.binary, "docker stats could not be run");
                return Vec::new();
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "docker stats timed out");
                return Vec::new();
            }
        };
        if !output.status.success() {
            warn!(
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "docker stats failed"
            );
            return Vec::new();
        }
        parse_stats_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parses `docker stats` JSON-lines output. Lines that do not parse are skipped.
pub fn parse_stats_output(stdout: &str) -> Vec<RawStatSnapshot> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|line| match serde_json::from_str::<StatsLine>(line) {
            Ok(l) if !l.name.is_empty() => Some(RawStatSnapshot::pre_formatted(
                l.name,
                FormattedStats {
                    cpu_perc: l.cpu_perc,
                    mem_usage: l.mem_usage,
                    mem_perc: l.mem_perc,
                    pids: l.pids,
                },
            )),
            Ok(_) => {
                warn!(line, "docker stats line without a container name");
                None
            }
            Err(e) => {
                warn!(error = %e, line, "unparseable docker stats line");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawStats;

    #[test]
    fn parses_json_lines() {
        let out = parse_stats_output(concat!(
            r#"{"BlockIO":"0B / 0B","CPUPerc":"0.52%","Container":"1f2e","ID":"1f2e","MemPerc":"1.26%","MemUsage":"25.1MiB / 1.944GiB","Name":"web-1","NetIO":"1kB / 0B","PIDs":"7"}"#,
            "\n",
            r#"{"CPUPerc":"12.00%","MemUsage":"1GiB / 2GiB","Name":"db","PIDs":"30"}"#,
            "\n"
        ));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name, "web-1");
        let RawStats::PreFormatted(f) = &out[0].stats else {
            panic!("expected pre-formatted stats");
        };
        assert_eq!(f.cpu_perc, "0.52%");
        assert_eq!(f.mem_usage, "25.1MiB / 1.944GiB");
        assert_eq!(f.mem_perc.as_deref(), Some("1.26%"));
        assert_eq!(f.pids, "7");
        let RawStats::PreFormatted(f) = &out[1].stats else {
            panic!("expected pre-formatted stats");
        };
        assert_eq!(f.mem_perc, None);
    }

    #[test]
    fn malformed_line_does_not_drop_the_others() {
        let out = parse_stats_output(concat!(
            "{not json\n",
            r#"{"CPUPerc":"1%","MemUsage":"1MiB / 1GiB","Name":"ok","PIDs":"1"}"#,
            "\n",
            r#"{"CPUPerc":"1%"}"#,
            "\n"
        ));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "ok");
    }

    #[test]
    fn numeric_fields_are_accepted() {
        let out = parse_stats_output(
            r#"{"CPUPerc":1.5,"MemUsage":"1MiB / 1GiB","MemPerc":0.1,"Name":"web-1","PIDs":7}"#,
        );
        assert_eq!(out.len(), 1);
        let RawStats::PreFormatted(f) = &out[0].stats else {
            panic!("expected pre-formatted stats");
        };
        assert_eq!(f.pids, "7");
        assert_eq!(f.cpu_perc, "1.5");
        assert_eq!(f.mem_perc.as_deref(), Some("0.1"));
    }

    #[test]
    fn null_mem_perc_is_absent() {
        let out = parse_stats_output(
            r#"{"CPUPerc":"1%","MemUsage":"1MiB / 1GiB","MemPerc":null,"Name":"a","PIDs":"2"}"#,
        );
        let RawStats::PreFormatted(f) = &out[0].stats else {
            panic!("expected pre-formatted stats");
        };
        assert_eq!(f.mem_perc, None);
    }

    #[test]
    fn empty_output_is_empty_poll() {
        assert!(parse_stats_output("").is_empty());
        assert!(parse_stats_output("\n\n").is_empty());
    }
}

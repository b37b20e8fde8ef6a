// src/recording/audit.rs
//! Append-only audit log of start/stop decisions
//!
//! One line per decision:
//!
//! ```text
//! 2024-04-18T10:42:07.311+00:00;stop;R1;T1;A;AC
//! ```

use crate::contest::model::RunSnapshot;
use crate::utils::errors::{RecorderError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

const DELIMITER: &str = ";";

/// Audit log configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub path: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("record.log"),
        }
    }
}

/// Logged decision kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Start,
    Stop,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditAction::Start => f.write_str("start"),
            AuditAction::Stop => f.write_str("stop"),
        }
    }
}

/// Render one audit line (without the trailing newline)
pub fn format_line(time: DateTime<Utc>, action: AuditAction, run: &RunSnapshot) -> String {
    [
        time.to_rfc3339_opts(SecondsFormat::Millis, false),
        action.to_string(),
        run.id.to_string(),
        run.team_id.to_string(),
        run.problem_id.to_string(),
        run.result.verdict().unwrap_or_default().to_string(),
    ]
    .join(DELIMITER)
}

/// Audit log file opened for appending
pub struct AuditLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl AuditLog {
    /// Open (creating if needed) the audit log
    pub async fn open(config: AuditConfig) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)
            .await
            .map_err(|e| {
                RecorderError::AuditFailed(format!("Failed to open {:?}: {}", config.path, e))
            })?;

        Ok(Self {
            path: config.path,
            file: Mutex::new(file),
        })
    }

    /// Append a decision line
    pub async fn append(
        &self,
        time: DateTime<Utc>,
        action: AuditAction,
        run: &RunSnapshot,
    ) -> Result<()> {
        let mut line = format_line(time, action, run);
        line.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await.map_err(|e| {
            RecorderError::AuditFailed(format!("Failed to append to {:?}: {}", self.path, e))
        })?;
        file.flush().await.map_err(|e| {
            RecorderError::AuditFailed(format!("Failed to flush {:?}: {}", self.path, e))
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contest::model::{RunId, RunResult, TeamId};
    use chrono::TimeZone;
    use std::time::Duration;

    fn run(result: RunResult) -> RunSnapshot {
        RunSnapshot {
            id: RunId::from("R1"),
            team_id: TeamId::from("T1"),
            problem_id: "A".into(),
            time: Duration::from_secs(60),
            result,
        }
    }

    #[test]
    fn test_line_format() {
        let time = Utc.with_ymd_and_hms(2024, 4, 18, 10, 42, 7).unwrap();

        assert_eq!(
            format_line(time, AuditAction::Start, &run(RunResult::InProgress)),
            "2024-04-18T10:42:07.000+00:00;start;R1;T1;A;"
        );
        assert_eq!(
            format_line(
                time,
                AuditAction::Stop,
                &run(RunResult::Judged {
                    verdict: "AC".into()
                })
            ),
            "2024-04-18T10:42:07.000+00:00;stop;R1;T1;A;AC"
        );
    }

    #[tokio::test]
    async fn test_append_keeps_existing_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.log");
        std::fs::write(&path, "previous\n").unwrap();

        let log = AuditLog::open(AuditConfig { path: path.clone() }).await.unwrap();
        log.append(Utc::now(), AuditAction::Start, &run(RunResult::InProgress))
            .await
            .unwrap();
        log.append(Utc::now(), AuditAction::Stop, &run(RunResult::InProgress))
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "previous");
        assert!(lines[1].contains(";start;R1;"));
        assert!(lines[2].contains(";stop;R1;"));
    }
}

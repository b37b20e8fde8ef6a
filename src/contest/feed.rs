// src/contest/feed.rs
//! Newline-delimited JSON contest feed
//!
//! Each non-blank line is one [`ContestUpdate`]. Malformed lines are logged
//! and skipped, including lines that are not UTF-8. Only an I/O error ends
//! the stream.

use crate::contest::model::ContestUpdate;
use crate::utils::errors::{RecorderError, Result};
use futures::stream::{self, BoxStream, StreamExt};
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

/// Path that selects standard input
pub const STDIN_PATH: &str = "-";

/// Feed source configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// File to read updates from, or `-` for stdin
    pub path: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            path: STDIN_PATH.to_string(),
        }
    }
}

/// Open the configured feed source
pub async fn open(config: &FeedConfig) -> Result<BoxStream<'static, ContestUpdate>> {
    if config.path == STDIN_PATH {
        info!("Reading contest feed from stdin");
        return Ok(updates(BufReader::new(tokio::io::stdin())));
    }

    let file = tokio::fs::File::open(&config.path).await.map_err(|e| {
        RecorderError::FeedError(format!("Failed to open feed {}: {}", config.path, e))
    })?;

    info!("Reading contest feed from {}", config.path);
    Ok(updates(BufReader::new(file)))
}

/// Turn a line-oriented reader into a stream of updates
pub fn updates<R>(reader: R) -> BoxStream<'static, ContestUpdate>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    stream::unfold((reader.split(b'\n'), 0u64), |(mut lines, mut line_no)| async move {
        loop {
            match lines.next_segment().await {
                Ok(Some(line)) => {
                    line_no += 1;
                    if line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    match serde_json::from_slice::<ContestUpdate>(&line) {
                        Ok(update) => return Some((update, (lines, line_no))),
                        Err(e) => warn!("Skipping malformed feed line {}: {}", line_no, e),
                    }
                }
                Ok(None) => {
                    debug!("Contest feed ended after {} lines", line_no);
                    return None;
                }
                Err(e) => {
                    error!("Contest feed read failed after line {}: {}", line_no, e);
                    return None;
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_skips_blank_and_malformed_lines() {
        let input = concat!(
            r#"{"type":"RunUpdate","run":{"id":"R1","teamId":"T1","problemId":"A","time":1000,"result":{"type":"InProgress"}}}"#,
            "\n\n",
            "not json\n",
            r#"{"type":"Analytics"}"#,
            "\n",
        );

        let collected: Vec<_> = updates(std::io::Cursor::new(input.as_bytes().to_vec()))
            .collect()
            .await;

        assert_eq!(collected.len(), 2);
        assert!(matches!(collected[0], ContestUpdate::RunUpdate { .. }));
        assert!(matches!(collected[1], ContestUpdate::Other));
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_skipped() {
        let mut input = br#"{"type":"Analytics"}"#.to_vec();
        input.extend_from_slice(b"\n\xff\xfe garbage\r\n");
        input.extend_from_slice(
            br#"{"type":"RunUpdate","run":{"id":"R2","teamId":"T1","problemId":"B","time":2000,"result":{"type":"Judged","verdict":"AC"}}}"#,
        );
        input.extend_from_slice(b"\r\n");

        let collected: Vec<_> = updates(std::io::Cursor::new(input)).collect().await;

        assert_eq!(collected.len(), 2);
        assert!(matches!(collected[0], ContestUpdate::Other));
        match &collected[1] {
            ContestUpdate::RunUpdate { run } => assert_eq!(run.id.to_string(), "R2"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_feed_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = FeedConfig {
            path: dir.path().join("absent.ndjson").to_string_lossy().into_owned(),
        };

        let result = open(&config).await;
        assert!(matches!(result, Err(RecorderError::FeedError(_))));
    }
}

// src/recording/record.rs
//! Persisted recording state of a single run
//!
//! Records only ever gain information: the first write of `start_time` and of
//! `stop_time` wins, later intents fill in missing fields only.

use crate::contest::model::RunId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Recording state of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordInfo {
    pub run_id: RunId,

    /// When the recording was first scheduled to start
    pub start_time: DateTime<Utc>,

    /// When the recording was scheduled to stop
    #[serde(default)]
    pub stop_time: Option<DateTime<Utc>>,

    /// Reserved for post-processing; never touched by the engine
    #[serde(default)]
    pub uploaded: bool,
}

/// Derived recording state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Started,
    Stopped,
}

impl RecordInfo {
    /// `Stopped` once the scheduled stop time has passed
    pub fn state_at(&self, now: DateTime<Utc>) -> RecordState {
        match self.stop_time {
            Some(stop) if stop <= now => RecordState::Stopped,
            _ => RecordState::Started,
        }
    }
}

/// Change requested for a run's record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordIntent {
    /// Recording started at `at`
    Start { at: DateTime<Utc> },

    /// Recording stopped at `at`; also the start if the start was never seen
    Stop { at: DateTime<Utc> },

    /// Recording started now with a precomputed default stop
    StartWithStop {
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    },
}

/// Apply `intent` to the existing record of `run_id`
pub fn reduce(existing: Option<&RecordInfo>, run_id: &RunId, intent: RecordIntent) -> RecordInfo {
    let (start, stop) = match intent {
        RecordIntent::Start { at } => (at, None),
        RecordIntent::Stop { at } => (at, Some(at)),
        RecordIntent::StartWithStop { start, stop } => (start, Some(stop)),
    };

    match existing {
        Some(record) => RecordInfo {
            run_id: record.run_id.clone(),
            start_time: record.start_time,
            stop_time: record.stop_time.or(stop),
            uploaded: record.uploaded,
        },
        None => RecordInfo {
            run_id: run_id.clone(),
            start_time: start,
            stop_time: stop,
            uploaded: false,
        },
    }
}

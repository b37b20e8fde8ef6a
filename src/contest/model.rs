// src/contest/model.rs
//! Contest, team and run snapshots as delivered by the contest feed
//!
//! Contest-relative durations travel as integer milliseconds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Run (submission) identifier
    RunId
);
string_id!(
    /// Team identifier
    TeamId
);
string_id!(ProblemId);

/// Judging state of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunResult {
    /// Judging has not completed yet
    InProgress,

    /// Final verdict, e.g. `AC` or `WA`
    Judged { verdict: String },
}

impl RunResult {
    pub fn verdict(&self) -> Option<&str> {
        match self {
            RunResult::InProgress => None,
            RunResult::Judged { verdict } => Some(verdict),
        }
    }
}

/// Latest known state of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    pub id: RunId,
    pub team_id: TeamId,
    pub problem_id: ProblemId,

    /// Submission time relative to contest start
    #[serde(with = "duration_ms")]
    pub time: Duration,

    pub result: RunResult,
}

/// Recording agent attached to a team
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingPeer {
    /// Base URL of the grabber serving this team
    pub url: String,

    /// Peer name the grabber knows the team's machine by
    pub peer_name: String,

    /// Admin credential for the grabber, if it requires one
    #[serde(default)]
    pub credential: Option<String>,
}

/// Team metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamInfo {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub recording: Option<RecordingPeer>,
}

/// Contest metadata and clock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestSnapshot {
    #[serde(default)]
    pub teams: HashMap<TeamId, TeamInfo>,

    /// Wall-clock contest start
    pub start_time: DateTime<Utc>,

    #[serde(with = "duration_ms")]
    pub contest_length: Duration,

    /// Contest-time seconds per wall-clock second (replays run faster)
    #[serde(default = "default_emulation_speed")]
    pub emulation_speed: f64,
}

fn default_emulation_speed() -> f64 {
    1.0
}

impl ContestSnapshot {
    pub fn team(&self, id: &TeamId) -> Option<&TeamInfo> {
        self.teams.get(id)
    }

    /// Contest time at wall-clock `now`, clamped to `[0, contest_length]`
    pub fn current_contest_time(&self, now: DateTime<Utc>) -> Duration {
        let elapsed = match now.signed_duration_since(self.start_time).to_std() {
            Ok(elapsed) => elapsed,
            // Before the start
            Err(_) => return Duration::ZERO,
        };
        Duration::try_from_secs_f64(elapsed.as_secs_f64() * self.speed())
            .unwrap_or(Duration::MAX)
            .min(self.contest_length)
    }

    /// Wall-clock instant at which contest time reaches `offset`
    ///
    /// `None` when that instant is not representable.
    pub fn instant_at(&self, offset: Duration) -> Option<DateTime<Utc>> {
        let real = Duration::try_from_secs_f64(offset.as_secs_f64() / self.speed()).ok()?;
        let real = chrono::Duration::from_std(real).ok()?;
        self.start_time.checked_add_signed(real)
    }

    fn speed(&self) -> f64 {
        if self.emulation_speed.is_finite() && self.emulation_speed > 0.0 {
            self.emulation_speed
        } else {
            1.0
        }
    }
}

/// One event of the ordered contest feed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContestUpdate {
    /// Replaces the contest snapshot wholesale
    InfoUpdate { info: ContestSnapshot },

    /// New state of a single run
    RunUpdate { run: RunSnapshot },

    /// Anything else the feed carries (commentary, analytics, ...)
    #[serde(other)]
    Other,
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

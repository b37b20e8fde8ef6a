// src/recording/engine.rs
//! Recording decision engine
//!
//! Turns run lifecycle transitions into start/stop commands:
//!
//! ```text
//! previous      new          record          action
//! ----------    ---------    ------------    ---------------------------------
//! (none)        InProgress   absent          persist start, start(max delay)
//! (none)        Judged       absent          persist start+default stop,
//!                                            start(max duration)
//! InProgress    Judged       not stopped     persist stop, stop after grace
//! ```
//!
//! Anything else is a duplicate or no transition at all. Every decision is
//! persisted before its command is dispatched, so replaying the feed after a
//! restart finds the record and sends nothing twice.

use crate::contest::model::{ContestSnapshot, RunResult, RunSnapshot, TeamInfo};
use crate::observability::DECISIONS_TOTAL;
use crate::recording::audit::{AuditAction, AuditLog};
use crate::recording::clock::Clock;
use crate::recording::dispatcher::CommandDispatcher;
use crate::recording::record::{RecordIntent, RecordState};
use crate::recording::storage::{Applied, RecordStorage};
use crate::utils::errors::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Recording time limits, in milliseconds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecordingTimings {
    /// Runs submitted longer ago than this are ignored; also the start
    /// timeout for runs seen in progress
    pub max_record_delay_ms: u64,

    /// Recording length for runs first seen already judged
    pub max_record_duration_ms: u64,

    /// Grace period between judging and the stop command
    pub record_after_stop_ms: u64,

    /// Recordings never run past contest end minus this margin
    pub contest_end_margin_ms: u64,
}

impl Default for RecordingTimings {
    fn default() -> Self {
        Self {
            max_record_delay_ms: 2 * 60 * 1000,
            max_record_duration_ms: 3 * 60 * 1000,
            record_after_stop_ms: 30 * 1000,
            contest_end_margin_ms: 3 * 1000,
        }
    }
}

impl RecordingTimings {
    pub fn max_record_delay(&self) -> Duration {
        Duration::from_millis(self.max_record_delay_ms)
    }

    pub fn max_record_duration(&self) -> Duration {
        Duration::from_millis(self.max_record_duration_ms)
    }

    pub fn record_after_stop(&self) -> Duration {
        Duration::from_millis(self.record_after_stop_ms)
    }

    pub fn contest_end_margin(&self) -> Duration {
        Duration::from_millis(self.contest_end_margin_ms)
    }
}

/// What the engine did with a run update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Submitted too long ago to be worth recording
    TooOld,

    /// Team is not part of the current contest snapshot
    UnknownTeam,

    /// First seen in progress: recording started
    StartedTesting,

    /// First seen already judged: recording started with a default stop
    StartedJudged,

    /// Judged after being in progress: recording stop scheduled
    Stopped,

    /// A start was requested for a run that already has a record
    DuplicateStart,

    /// A stop was requested for a run whose record is already stopped
    DuplicateStop,

    /// The update does not change the run's lifecycle
    NoTransition,
}

impl Decision {
    /// Update was filtered out before reaching the state machine
    pub fn is_filtered(&self) -> bool {
        matches!(self, Decision::TooOld | Decision::UnknownTeam)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Decision::TooOld => "too_old",
            Decision::UnknownTeam => "unknown_team",
            Decision::StartedTesting => "started_testing",
            Decision::StartedJudged => "started_judged",
            Decision::Stopped => "stopped",
            Decision::DuplicateStart => "duplicate_start",
            Decision::DuplicateStop => "duplicate_stop",
            Decision::NoTransition => "no_transition",
        }
    }
}

/// Clamp `requested` so it ends `margin` before the contest does
///
/// Once that point has passed the contest is over and `requested` is
/// returned unchanged. So it is when the contest end cannot be represented.
pub fn clamp_to_contest_end(
    contest: &ContestSnapshot,
    requested: Duration,
    margin: Duration,
    now: DateTime<Utc>,
) -> Duration {
    let Some(stop_at) = contest.instant_at(contest.contest_length.saturating_sub(margin)) else {
        return requested;
    };
    match stop_at.signed_duration_since(now).to_std() {
        Ok(remaining) => requested.min(remaining),
        Err(_) => requested,
    }
}

/// `now + duration`, saturating at the latest representable instant
fn after(now: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Decides, persists and dispatches recording commands
pub struct RecordingEngine {
    storage: Arc<RecordStorage>,
    dispatcher: CommandDispatcher,
    audit: Option<AuditLog>,
    clock: Arc<dyn Clock>,
    timings: RecordingTimings,
}

impl RecordingEngine {
    pub fn new(
        storage: Arc<RecordStorage>,
        dispatcher: CommandDispatcher,
        clock: Arc<dyn Clock>,
        timings: RecordingTimings,
    ) -> Self {
        Self {
            storage,
            dispatcher,
            audit: None,
            clock,
            timings,
        }
    }

    /// Append every start/stop decision to `audit`
    pub fn with_audit_log(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn storage(&self) -> &Arc<RecordStorage> {
        &self.storage
    }

    /// Dispatcher owning the spawned agent commands
    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// Handle one run update given the previously observed snapshot
    ///
    /// Only a storage failure is returned as an error.
    pub async fn on_run_update(
        &self,
        contest: &ContestSnapshot,
        previous: Option<&RunSnapshot>,
        run: &RunSnapshot,
    ) -> Result<Decision> {
        let decision = self.decide(contest, previous, run).await?;
        metrics::counter!(DECISIONS_TOTAL, "kind" => decision.kind()).increment(1);
        Ok(decision)
    }

    async fn decide(
        &self,
        contest: &ContestSnapshot,
        previous: Option<&RunSnapshot>,
        run: &RunSnapshot,
    ) -> Result<Decision> {
        let now = self.clock.now();

        let age = contest.current_contest_time(now).saturating_sub(run.time);
        if age > self.timings.max_record_delay() {
            info!("Skip too old run {}", run.id);
            return Ok(Decision::TooOld);
        }

        let Some(team) = contest.team(&run.team_id) else {
            debug!("Skip run {} of unknown team {}", run.id, run.team_id);
            return Ok(Decision::UnknownTeam);
        };

        match (previous.map(|p| &p.result), &run.result) {
            (Some(RunResult::InProgress), RunResult::Judged { .. }) => {
                self.stop_judged(contest, team, run, now).await
            }
            (None, RunResult::InProgress) => self.start_testing(contest, team, run, now).await,
            (None, RunResult::Judged { .. }) => self.start_judged(contest, team, run, now).await,
            _ => Ok(Decision::NoTransition),
        }
    }

    async fn stop_judged(
        &self,
        contest: &ContestSnapshot,
        team: &TeamInfo,
        run: &RunSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Decision> {
        let applied = self
            .storage
            .apply(&run.id, |existing| match existing {
                Some(record) if record.state_at(now) == RecordState::Stopped => None,
                _ => Some(RecordIntent::Stop { at: now }),
            })
            .await?;

        if let Applied::Skipped { .. } = applied {
            warn!("Record already stopped for {}", run.id);
            return Ok(Decision::DuplicateStop);
        }

        self.audit(now, AuditAction::Stop, run).await;
        info!("Schedule stop of {} ({})", run.id, run.result.verdict().unwrap_or_default());

        let delay = self.clamp(contest, self.timings.record_after_stop(), now);
        self.dispatcher.stop(&run.id, &run.team_id, team, delay);
        Ok(Decision::Stopped)
    }

    async fn start_testing(
        &self,
        contest: &ContestSnapshot,
        team: &TeamInfo,
        run: &RunSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Decision> {
        let applied = self
            .storage
            .apply(&run.id, |existing| {
                existing.is_none().then_some(RecordIntent::Start { at: now })
            })
            .await?;

        if let Applied::Skipped { .. } = applied {
            warn!("Record already started (as testing) for {}", run.id);
            return Ok(Decision::DuplicateStart);
        }

        self.audit(now, AuditAction::Start, run).await;
        info!("Start testing {}", run.id);

        let timeout = self.clamp(contest, self.timings.max_record_delay(), now);
        self.dispatcher.start(&run.id, &run.team_id, team, timeout);
        Ok(Decision::StartedTesting)
    }

    async fn start_judged(
        &self,
        contest: &ContestSnapshot,
        team: &TeamInfo,
        run: &RunSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Decision> {
        let duration = self.timings.max_record_duration();
        let applied = self
            .storage
            .apply(&run.id, |existing| {
                existing.is_none().then_some(RecordIntent::StartWithStop {
                    start: now,
                    stop: after(now, duration),
                })
            })
            .await?;

        if let Applied::Skipped { .. } = applied {
            warn!("Record already started (as judged) for {}", run.id);
            return Ok(Decision::DuplicateStart);
        }

        self.audit(now, AuditAction::Start, run).await;
        info!("Start judged {} {}", run.id, run.result.verdict().unwrap_or_default());

        let timeout = self.clamp(contest, duration, now);
        self.dispatcher.start(&run.id, &run.team_id, team, timeout);
        Ok(Decision::StartedJudged)
    }

    fn clamp(&self, contest: &ContestSnapshot, requested: Duration, now: DateTime<Utc>) -> Duration {
        clamp_to_contest_end(contest, requested, self.timings.contest_end_margin(), now)
    }

    async fn audit(&self, time: DateTime<Utc>, action: AuditAction, run: &RunSnapshot) {
        let Some(audit) = &self.audit else {
            return;
        };
        if let Err(e) = audit.append(time, action, run).await {
            warn!("Failed to write audit line for {}: {}", run.id, e);
        }
    }
}

// src/recording/recorder.rs
//! Single-consumer loop over the contest feed
//!
//! Updates are handled strictly one at a time in arrival order. The loop
//! only ever waits for the next update and for the store; agent commands run
//! in their own tasks.

use crate::contest::cache::ContestStateCache;
use crate::contest::model::ContestUpdate;
use crate::recording::engine::{Decision, RecordingEngine};
use crate::utils::errors::Result;
use futures::{Stream, StreamExt};
use tracing::{debug, info, warn};

/// Counters over the updates seen so far
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecorderStats {
    pub info_updates: u64,
    pub run_updates: u64,
    pub ignored_updates: u64,
    pub starts: u64,
    pub stops: u64,
    pub duplicates: u64,
}

impl RecorderStats {
    fn count(&mut self, decision: Decision) {
        match decision {
            Decision::StartedTesting | Decision::StartedJudged => self.starts += 1,
            Decision::Stopped => self.stops += 1,
            Decision::DuplicateStart | Decision::DuplicateStop => self.duplicates += 1,
            Decision::TooOld | Decision::UnknownTeam | Decision::NoTransition => {}
        }
    }
}

/// Feeds contest updates through the cache and the decision engine
pub struct Recorder {
    cache: ContestStateCache,
    engine: RecordingEngine,
    stats: RecorderStats,
}

impl Recorder {
    pub fn new(engine: RecordingEngine) -> Self {
        Self {
            cache: ContestStateCache::new(),
            engine,
            stats: RecorderStats::default(),
        }
    }

    /// Handle one update; returns the engine decision for run updates
    pub async fn handle(&mut self, update: ContestUpdate) -> Result<Option<Decision>> {
        match update {
            ContestUpdate::InfoUpdate { info } => {
                debug!("Contest info updated ({} teams)", info.teams.len());
                self.cache.replace_contest(info);
                self.stats.info_updates += 1;
                Ok(None)
            }
            ContestUpdate::RunUpdate { run } => {
                let Some(contest) = self.cache.contest() else {
                    debug!("Ignoring run {} received before contest info", run.id);
                    self.stats.ignored_updates += 1;
                    return Ok(None);
                };

                let decision = self
                    .engine
                    .on_run_update(&contest, self.cache.last_seen(&run.id), &run)
                    .await?;

                self.stats.run_updates += 1;
                self.stats.count(decision);
                if !decision.is_filtered() {
                    self.cache.remember(run);
                }
                Ok(Some(decision))
            }
            ContestUpdate::Other => {
                self.stats.ignored_updates += 1;
                Ok(None)
            }
        }
    }

    /// Consume `updates` until the stream ends or a fatal error occurs
    pub async fn run<S>(&mut self, mut updates: S) -> Result<RecorderStats>
    where
        S: Stream<Item = ContestUpdate> + Unpin,
    {
        info!("Recorder started");

        while let Some(update) = updates.next().await {
            if let Err(e) = self.handle(update).await {
                if e.is_fatal() {
                    return Err(e);
                }
                warn!("Failed to handle contest update: {}", e);
            }
        }

        info!("Contest feed finished: {:?}", self.stats);
        Ok(self.stats.clone())
    }

    pub fn stats(&self) -> &RecorderStats {
        &self.stats
    }

    pub fn cache(&self) -> &ContestStateCache {
        &self.cache
    }

    pub fn engine(&self) -> &RecordingEngine {
        &self.engine
    }
}

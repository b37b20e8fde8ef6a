// src/contest/cache.rs
//! In-memory view of the contest built from the feed
//!
//! Owned by the single consumer loop, so no synchronization.

use crate::contest::model::{ContestSnapshot, RunId, RunSnapshot};
use std::collections::HashMap;
use std::sync::Arc;

/// Latest contest snapshot plus the last observed state of every run
#[derive(Debug, Default)]
pub struct ContestStateCache {
    contest: Option<Arc<ContestSnapshot>>,
    runs: HashMap<RunId, RunSnapshot>,
}

impl ContestStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current contest snapshot, `None` until the first info update
    pub fn contest(&self) -> Option<Arc<ContestSnapshot>> {
        self.contest.clone()
    }

    pub fn replace_contest(&mut self, contest: ContestSnapshot) {
        self.contest = Some(Arc::new(contest));
    }

    /// Snapshot of `run_id` as last observed
    pub fn last_seen(&self, run_id: &RunId) -> Option<&RunSnapshot> {
        self.runs.get(run_id)
    }

    /// Store `run` as the last observed snapshot, returning the previous one
    pub fn remember(&mut self, run: RunSnapshot) -> Option<RunSnapshot> {
        self.runs.insert(run.id.clone(), run)
    }

    pub fn run_count(&self) -> usize {
        self.runs.len()
    }
}

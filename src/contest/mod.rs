// src/contest/mod.rs
//! Contest feed consumption
//!
//! - **Model**: contest, team and run snapshots
//! - **Cache**: latest contest snapshot and last observed run states
//! - **Feed**: newline-delimited JSON event source

pub mod cache;
pub mod feed;
pub mod model;

pub use cache::ContestStateCache;
pub use feed::FeedConfig;
pub use model::{
    ContestSnapshot, ContestUpdate, ProblemId, RecordingPeer, RunId, RunResult, RunSnapshot,
    TeamId, TeamInfo,
};

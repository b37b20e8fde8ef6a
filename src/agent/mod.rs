// src/agent/mod.rs
//! Recording agent interface
//!
//! A recording agent (the "grabber") captures a team's screen and webcam.
//! The recorder only asks it to start, stop or upload a recording; every
//! call either succeeds or fails with a [`RecorderError`].
//!
//! [`RecorderError`]: crate::utils::errors::RecorderError

#[cfg(test)]
pub(crate) mod fake;
pub mod grabber;

use crate::contest::model::RecordingPeer;
use crate::utils::errors::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub use grabber::{GrabberClient, GrabberConfig, GrabberProvider};

/// Commands understood by a recording agent
#[async_trait]
pub trait RecordingAgent: Send + Sync {
    /// Start recording `record_id` on `peer_name`, stopping by itself after `timeout`
    async fn start_record(&self, peer_name: &str, record_id: &str, timeout: Duration) -> Result<()>;

    async fn stop_record(&self, peer_name: &str, record_id: &str) -> Result<()>;

    async fn upload_record(&self, peer_name: &str, record_id: &str) -> Result<()>;
}

/// Resolves the agent serving a team's recording peer
pub trait AgentProvider: Send + Sync {
    fn agent_for(&self, peer: &RecordingPeer) -> Arc<dyn RecordingAgent>;
}

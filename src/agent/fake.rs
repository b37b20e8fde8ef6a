// src/agent/fake.rs
//! In-memory agent that records every call

use crate::agent::{AgentProvider, RecordingAgent};
use crate::contest::model::RecordingPeer;
use crate::utils::errors::{RecorderError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentCall {
    Start {
        peer_name: String,
        record_id: String,
        timeout: Duration,
    },
    Stop {
        peer_name: String,
        record_id: String,
    },
    Upload {
        peer_name: String,
        record_id: String,
    },
}

#[derive(Default)]
pub struct FakeProvider {
    calls: Arc<Mutex<Vec<AgentCall>>>,
    fail: bool,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider whose agents record the call and then fail it
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<AgentCall> {
        self.calls.lock().clone()
    }
}

impl AgentProvider for FakeProvider {
    fn agent_for(&self, _peer: &RecordingPeer) -> Arc<dyn RecordingAgent> {
        Arc::new(FakeAgent {
            calls: Arc::clone(&self.calls),
            fail: self.fail,
        })
    }
}

struct FakeAgent {
    calls: Arc<Mutex<Vec<AgentCall>>>,
    fail: bool,
}

impl FakeAgent {
    fn record(&self, call: AgentCall) -> Result<()> {
        self.calls.lock().push(call);
        if self.fail {
            return Err(RecorderError::AgentRequestFailed("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordingAgent for FakeAgent {
    async fn start_record(&self, peer_name: &str, record_id: &str, timeout: Duration) -> Result<()> {
        self.record(AgentCall::Start {
            peer_name: peer_name.to_string(),
            record_id: record_id.to_string(),
            timeout,
        })
    }

    async fn stop_record(&self, peer_name: &str, record_id: &str) -> Result<()> {
        self.record(AgentCall::Stop {
            peer_name: peer_name.to_string(),
            record_id: record_id.to_string(),
        })
    }

    async fn upload_record(&self, peer_name: &str, record_id: &str) -> Result<()> {
        self.record(AgentCall::Upload {
            peer_name: peer_name.to_string(),
            record_id: record_id.to_string(),
        })
    }
}

// src/recording/dispatcher.rs
//! Fire-and-forget delivery of agent commands
//!
//! Every command runs in its own tokio task tracked by the dispatcher, so a
//! finished feed can wait for delayed stops with [`CommandDispatcher::drain`].
//! Failures are logged and counted, never retried and never reported back:
//! the persisted record is what says whether a run should be recorded.

use crate::agent::AgentProvider;
use crate::contest::model::{RunId, TeamId, TeamInfo};
use crate::observability::{DISPATCH_FAILURES_TOTAL, DISPATCH_TOTAL};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Command sent to a recording agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentCommand {
    Start { timeout: Duration },
    Stop,
    Upload,
}

impl AgentCommand {
    pub fn name(&self) -> &'static str {
        match self {
            AgentCommand::Start { .. } => "start",
            AgentCommand::Stop => "stop",
            AgentCommand::Upload => "upload",
        }
    }
}

/// Spawns agent commands for teams' recording peers
#[derive(Clone)]
pub struct CommandDispatcher {
    agents: Arc<dyn AgentProvider>,
    tasks: TaskTracker,
}

impl CommandDispatcher {
    pub fn new(agents: Arc<dyn AgentProvider>) -> Self {
        Self {
            agents,
            tasks: TaskTracker::new(),
        }
    }

    /// Number of commands spawned but not finished yet
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Wait until every spawned command, delayed stops included, has finished
    ///
    /// Commands spawned while draining are waited for too.
    pub async fn drain(&self) {
        self.tasks.close();
        if !self.tasks.is_empty() {
            info!("Waiting for {} pending agent commands", self.tasks.len());
        }
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// Start recording `run_id` for the team, bounded by `timeout`
    pub fn start(
        &self,
        run_id: &RunId,
        team_id: &TeamId,
        team: &TeamInfo,
        timeout: Duration,
    ) -> Option<JoinHandle<()>> {
        self.dispatch(AgentCommand::Start { timeout }, run_id, team_id, team, Duration::ZERO)
    }

    /// Stop recording `run_id` once `delay` has passed
    pub fn stop(
        &self,
        run_id: &RunId,
        team_id: &TeamId,
        team: &TeamInfo,
        delay: Duration,
    ) -> Option<JoinHandle<()>> {
        self.dispatch(AgentCommand::Stop, run_id, team_id, team, delay)
    }

    /// Ask the team's agent to upload the recording of `run_id`
    pub fn upload(&self, run_id: &RunId, team_id: &TeamId, team: &TeamInfo) -> Option<JoinHandle<()>> {
        self.dispatch(AgentCommand::Upload, run_id, team_id, team, Duration::ZERO)
    }

    /// Spawn `command`; `None` when the team has no recording peer
    fn dispatch(
        &self,
        command: AgentCommand,
        run_id: &RunId,
        team_id: &TeamId,
        team: &TeamInfo,
        delay: Duration,
    ) -> Option<JoinHandle<()>> {
        let Some(peer) = team.recording.clone() else {
            info!(
                "No recording peer for team {}, not sending {} for {}",
                team_id,
                command.name(),
                run_id
            );
            return None;
        };

        let agent = self.agents.agent_for(&peer);
        let record_id = run_id.to_string();

        Some(self.tasks.spawn(async move {
            if !delay.is_zero() {
                debug!("Delaying {} of {} by {:?}", command.name(), record_id, delay);
                tokio::time::sleep(delay).await;
            }

            metrics::counter!(DISPATCH_TOTAL, "command" => command.name()).increment(1);

            let result = match command {
                AgentCommand::Start { timeout } => {
                    agent.start_record(&peer.peer_name, &record_id, timeout).await
                }
                AgentCommand::Stop => agent.stop_record(&peer.peer_name, &record_id).await,
                AgentCommand::Upload => agent.upload_record(&peer.peer_name, &record_id).await,
            };

            if let Err(e) = result {
                metrics::counter!(DISPATCH_FAILURES_TOTAL, "command" => command.name()).increment(1);
                warn!(
                    "Failed to send {} command to {} at {} ({}): {}",
                    command.name(),
                    peer.peer_name,
                    peer.url,
                    record_id,
                    e
                );
            }
        }))
    }
}

// src/lib.rs
//! Reaction Recorder
//!
//! Watches a contest's run feed and asks each team's recording agent to
//! capture the moment a submission is judged. Every run is started and
//! stopped at most once, including across restarts.
//!
//! # Architecture
//!
//! - **contest**: feed model, contest state cache, NDJSON feed source
//! - **recording**: decision engine, durable record storage, dispatcher
//! - **agent**: recording agent interface and HTTP grabber client
//! - **observability**: tracing and metrics setup
//! - **utils**: configuration and errors

pub mod agent;
pub mod contest;
pub mod observability;
pub mod recording;
pub mod utils;

// Re-export commonly used types
pub use agent::{AgentProvider, GrabberProvider, RecordingAgent};
pub use contest::{ContestSnapshot, ContestUpdate, RunSnapshot};
pub use recording::{Recorder, RecordingEngine, RecordStorage};
pub use utils::config::AppConfig;
pub use utils::errors::{RecorderError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

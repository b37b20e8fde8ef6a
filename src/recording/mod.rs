// src/recording/mod.rs
//! Recording decisions and their persistence
//!
//! - **Record**: persisted per-run state and its first-write-wins reducer
//! - **Storage**: crash-safe snapshot store of all records
//! - **Engine**: run lifecycle state machine
//! - **Dispatcher**: fire-and-forget agent commands
//! - **Recorder**: single-consumer loop over the contest feed
//! - **Audit**: append-only decision log
//!
//! # Architecture
//!
//! ```text
//! Feed → Recorder → ContestStateCache
//!           │
//!           └→ RecordingEngine → RecordStorage (persist, fsync, rename)
//!                    │
//!                    └→ CommandDispatcher → tokio::spawn → RecordingAgent
//! ```

pub mod audit;
pub mod clock;
pub mod dispatcher;
pub mod engine;
pub mod record;
pub mod recorder;
pub mod storage;

// Re-export commonly used types
pub use audit::{AuditConfig, AuditLog};
pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatcher::{AgentCommand, CommandDispatcher};
pub use engine::{Decision, RecordingEngine, RecordingTimings};
pub use record::{RecordInfo, RecordIntent, RecordState};
pub use recorder::{Recorder, RecorderStats};
pub use storage::{Applied, RecordStorage, StorageConfig};

//! Recording session management
//!
//! This module provides the `SessionRegistry` that owns every live recording:
//! - Session creation with an exclusively-owned stream writer
//! - Chunk persistence for active sessions
//! - Activity tracking for stale-session reclamation
//! - Idempotent finalize shared by end frames, disconnects, and the reaper

mod activity;
mod completion;
mod registry;
mod state;
mod stats;

pub use activity::ActivityTracker;
pub use completion::CompletionRecord;
pub use registry::{ChunkAck, SessionRegistry, SessionStarted};
pub use state::SessionState;
pub use stats::SessionStats;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::state::SessionState;

/// Point-in-time view of a live session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub session_id: String,

    pub user_id: String,

    #[serde(rename = "metaId")]
    pub recording_id: String,

    pub state: SessionState,

    /// When the session was started
    pub started_at: DateTime<Utc>,

    /// Seconds since the last frame for this session
    pub idle_secs: f64,

    /// Decoded bytes persisted so far
    pub bytes_written: u64,

    /// Data frames appended so far
    pub chunks_count: u64,

    pub file_name: String,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of a successful finalize, handed to the completion emitter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    pub session_id: String,
    #[serde(rename = "metaId")]
    pub recording_id: String,
    pub file_path: PathBuf,
    pub file_name: String,
    pub completed_at: DateTime<Utc>,
}

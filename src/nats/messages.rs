use serde::{Deserialize, Serialize};

use crate::session::CompletionRecord;

/// Recording-completed event published once per finalized session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordCompletedEvent {
    pub session_id: String,
    pub meta_id: String,
    pub file_path: String,
    pub file_name: String,
    pub completed_at: String, // RFC3339 timestamp
}

impl From<&CompletionRecord> for RecordCompletedEvent {
    fn from(record: &CompletionRecord) -> Self {
        Self {
            session_id: record.session_id.clone(),
            meta_id: record.recording_id.clone(),
            file_path: record.file_path.display().to_string(),
            file_name: record.file_name.clone(),
            completed_at: record.completed_at.to_rfc3339(),
        }
    }
}

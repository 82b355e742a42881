use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::activity::ActivityTracker;
use super::completion::CompletionRecord;
use super::state::SessionState;
use super::stats::SessionStats;
use crate::audio::{self, StreamWriter};
use crate::config::StorageConfig;
use crate::error::{Result, SessionError};
use crate::nats::CompletionEmitter;

/// Reply to a successful `start`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStarted {
    pub session_id: String,
    #[serde(rename = "metaId")]
    pub recording_id: String,
    pub file_name: String,
}

/// Reply to a successfully appended chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkAck {
    /// Decoded bytes written for this chunk
    pub bytes: usize,
    /// Decoded bytes written for the whole session
    pub total_bytes: u64,
}

struct SessionEntry {
    session_id: String,
    user_id: String,
    recording_id: String,
    started_at: DateTime<Utc>,
    inner: Mutex<SessionInner>,
}

struct SessionInner {
    state: SessionState,
    writer: StreamWriter,
    chunks: u64,
}

/// Owner of every live recording session
///
/// The map lock is only held to look up, insert, or remove entries, never
/// across file I/O. All per-session work happens under that session's own
/// mutex, so sessions never wait on each other and the three finalize
/// triggers (end frame, disconnect, reaper) serialize on the same lock.
pub struct SessionRegistry {
    storage: StorageConfig,
    sessions: RwLock<HashMap<String, Arc<SessionEntry>>>,
    /// Ids whose recording file is being opened
    starting: std::sync::Mutex<HashSet<String>>,
    closing: AtomicBool,
    activity: ActivityTracker,
    emitter: CompletionEmitter,
}

/// Claim on a session id while its writer is created outside the map lock
///
/// Dropping it releases the id, including when `start` fails or is cancelled.
struct StartReservation<'a> {
    registry: &'a SessionRegistry,
    session_id: String,
}

impl Drop for StartReservation<'_> {
    fn drop(&mut self) {
        self.registry.lock_starting().remove(&self.session_id);
    }
}

impl SessionRegistry {
    pub fn new(storage: StorageConfig, emitter: CompletionEmitter) -> Self {
        info!(
            "Session registry initialized (recordings: {})",
            storage.recordings_path.display()
        );

        Self {
            storage,
            sessions: RwLock::new(HashMap::new()),
            starting: std::sync::Mutex::new(HashSet::new()),
            closing: AtomicBool::new(false),
            activity: ActivityTracker::new(),
            emitter,
        }
    }

    /// Open a new session and its recording file
    ///
    /// `recording_id` defaults to `session_id` when absent or blank.
    pub async fn start(
        &self,
        session_id: &str,
        user_id: &str,
        recording_id: Option<&str>,
    ) -> Result<SessionStarted> {
        let recording_id = recording_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(session_id)
            .to_string();

        let reservation = self.reserve(session_id).await?;

        let writer = StreamWriter::create(&self.storage, &recording_id, Local::now())?;
        let started = SessionStarted {
            session_id: session_id.to_string(),
            recording_id: recording_id.clone(),
            file_name: writer.file_name().to_string(),
        };

        let mut sessions = self.sessions.write().await;
        if self.is_closing() {
            drop(sessions);
            drop(reservation);
            discard(writer);
            return Err(SessionError::ShuttingDown);
        }

        sessions.insert(
            session_id.to_string(),
            Arc::new(SessionEntry {
                session_id: session_id.to_string(),
                user_id: user_id.to_string(),
                recording_id,
                started_at: Utc::now(),
                inner: Mutex::new(SessionInner {
                    state: SessionState::Active,
                    writer,
                    chunks: 0,
                }),
            }),
        );
        self.activity.register(session_id, Instant::now());
        // Released while the map lock is still held, so the id is never unclaimed
        drop(reservation);
        drop(sessions);

        info!(
            "Recording started: session={} user={} metaId={} file={}",
            started.session_id, user_id, started.recording_id, started.file_name
        );

        Ok(started)
    }

    /// Decode and persist one chunk for an active session
    pub async fn append_data(&self, session_id: &str, chunk: &str) -> Result<ChunkAck> {
        let entry = self
            .entry(session_id)
            .await
            .ok_or_else(|| SessionError::NoActiveSession(session_id.to_string()))?;

        let mut inner = entry.inner.lock().await;
        if !inner.state.accepts_data() {
            return Err(SessionError::NoActiveSession(session_id.to_string()));
        }

        self.activity.touch(session_id);

        let bytes = match inner.writer.write_chunk(chunk) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Dropped chunk for session {}: {}", session_id, e);
                return Err(e);
            }
        };
        inner.chunks += 1;

        Ok(ChunkAck {
            bytes,
            total_bytes: inner.writer.bytes_written(),
        })
    }

    /// Record activity. Unknown sessions are ignored.
    pub fn touch(&self, session_id: &str) -> bool {
        let known = self.activity.touch(session_id);
        if !known {
            debug!("Ignoring activity for unknown session {}", session_id);
        }
        known
    }

    /// Close a session's file and emit its completion exactly once
    ///
    /// Every caller after the first gets `NotFound`.
    pub async fn finalize(&self, session_id: &str) -> Result<CompletionRecord> {
        let entry = self
            .entry(session_id)
            .await
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        let mut inner = entry.inner.lock().await;
        if inner.state != SessionState::Active {
            return Err(SessionError::NotFound(session_id.to_string()));
        }
        inner.state = SessionState::Finalizing;

        // Chunks were flushed as they arrived; a failed close loses nothing already acknowledged
        let closed = match inner.writer.close() {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to close recording for session {}: {}", session_id, e);
                false
            }
        };

        self.activity.forget(session_id);
        {
            let mut sessions = self.sessions.write().await;
            if sessions
                .get(session_id)
                .is_some_and(|live| Arc::ptr_eq(live, &entry))
            {
                sessions.remove(session_id);
            }
        }
        inner.state = SessionState::Closed;

        let record = CompletionRecord {
            session_id: entry.session_id.clone(),
            recording_id: entry.recording_id.clone(),
            file_path: inner.writer.file_path().to_path_buf(),
            file_name: inner.writer.file_name().to_string(),
            completed_at: Utc::now(),
        };
        let chunks = inner.chunks;
        let bytes = inner.writer.bytes_written();
        drop(inner);

        if closed {
            if let Err(e) = audio::sync_to_disk(record.file_path.clone()).await {
                error!("Failed to sync recording for session {}: {}", session_id, e);
            }
        }

        info!(
            "Recording finalized: session={} file={} ({} chunks, {} bytes)",
            record.session_id, record.file_name, chunks, bytes
        );

        self.emitter.emit(record.clone());

        Ok(record)
    }

    /// Refuse new recordings, then finalize every live session
    ///
    /// Connections that outlive the HTTP server can keep sending frames; any
    /// `start` after this point fails with `ShuttingDown`.
    pub async fn shutdown(&self) -> Vec<CompletionRecord> {
        {
            // Taken so no start is between its closing check and its insert
            let _sessions = self.sessions.write().await;
            self.closing.store(true, Ordering::SeqCst);
        }
        info!("Session registry closing; new recordings are refused");
        self.finalize_all().await
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    /// Finalize every live session
    pub async fn finalize_all(&self) -> Vec<CompletionRecord> {
        let ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        if !ids.is_empty() {
            info!("Finalizing {} live session(s)", ids.len());
        }

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            match self.finalize(&id).await {
                Ok(record) => records.push(record),
                Err(SessionError::NotFound(_)) => {}
                Err(e) => error!("Failed to finalize session {}: {}", id, e),
            }
        }
        records
    }

    pub async fn get(&self, session_id: &str) -> Option<SessionStats> {
        let entry = self.entry(session_id).await?;
        self.stats_for(&entry).await
    }

    /// Summaries of all live sessions, oldest first
    pub async fn snapshot(&self) -> Vec<SessionStats> {
        let entries: Vec<Arc<SessionEntry>> =
            self.sessions.read().await.values().cloned().collect();

        let mut stats = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(s) = self.stats_for(&entry).await {
                stats.push(s);
            }
        }
        stats.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        stats
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn activity(&self) -> &ActivityTracker {
        &self.activity
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    async fn reserve(&self, session_id: &str) -> Result<StartReservation<'_>> {
        let sessions = self.sessions.read().await;
        if self.is_closing() {
            return Err(SessionError::ShuttingDown);
        }

        let claimed = !sessions.contains_key(session_id)
            && self.lock_starting().insert(session_id.to_string());
        if !claimed {
            warn!("Rejected start for session {}: already recording", session_id);
            return Err(SessionError::AlreadyActive(session_id.to_string()));
        }

        Ok(StartReservation {
            registry: self,
            session_id: session_id.to_string(),
        })
    }

    fn lock_starting(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.starting
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn entry(&self, session_id: &str) -> Option<Arc<SessionEntry>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    async fn stats_for(&self, entry: &SessionEntry) -> Option<SessionStats> {
        let inner = entry.inner.lock().await;
        if !inner.state.is_live() {
            return None;
        }

        let idle_secs = self
            .activity
            .last_seen(&entry.session_id)
            .map(|at| Instant::now().saturating_duration_since(at).as_secs_f64())
            .unwrap_or_default();

        Some(SessionStats {
            session_id: entry.session_id.clone(),
            user_id: entry.user_id.clone(),
            recording_id: entry.recording_id.clone(),
            state: inner.state,
            started_at: entry.started_at,
            idle_secs,
            bytes_written: inner.writer.bytes_written(),
            chunks_count: inner.chunks,
            file_name: inner.writer.file_name().to_string(),
        })
    }
}

/// Close and delete a writer whose session was never published
fn discard(mut writer: StreamWriter) {
    if let Err(e) = writer.close() {
        warn!("Failed to close unpublished recording: {}", e);
    }
    if let Err(e) = std::fs::remove_file(writer.file_path()) {
        warn!(
            "Failed to remove unpublished recording {}: {}",
            writer.file_path().display(),
            e
        );
    }
}

use std::collections::HashMap;
use std::sync::Mutex;
use tokio::time::Instant;

/// Last-seen timestamp per live session
///
/// Only sessions that were explicitly registered are tracked; touching an
/// unknown id does nothing, so a late heartbeat cannot resurrect an entry
/// for a session that was already finalized.
#[derive(Debug, Default)]
pub struct ActivityTracker {
    last_seen: Mutex<HashMap<String, Instant>>,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session_id: &str, at: Instant) {
        self.lock().insert(session_id.to_string(), at);
    }

    /// Record activity now. Returns false if the session is not tracked.
    pub fn touch(&self, session_id: &str) -> bool {
        self.touch_at(session_id, Instant::now())
    }

    pub fn touch_at(&self, session_id: &str, at: Instant) -> bool {
        match self.lock().get_mut(session_id) {
            Some(last) => {
                // Never move backwards if touches race
                if at > *last {
                    *last = at;
                }
                true
            }
            None => false,
        }
    }

    pub fn forget(&self, session_id: &str) {
        self.lock().remove(session_id);
    }

    pub fn last_seen(&self, session_id: &str) -> Option<Instant> {
        self.lock().get(session_id).copied()
    }

    pub fn snapshot(&self) -> Vec<(String, Instant)> {
        self.lock()
            .iter()
            .map(|(id, at)| (id.clone(), *at))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Instant>> {
        // The map holds plain timestamps; a panic mid-update cannot leave it inconsistent
        self.last_seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

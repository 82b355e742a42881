//! Background reclamation of abandoned sessions
//!
//! Every sweep snapshots each session's last activity and finalizes the ones
//! idle for at least `stale_after`. A session touched between the snapshot
//! and the finalize may be reclaimed one sweep late; finalize is idempotent,
//! so racing an end frame or a disconnect is harmless.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ReaperConfig;
use crate::error::SessionError;
use crate::session::{CompletionRecord, SessionRegistry};

pub struct Reaper {
    registry: Arc<SessionRegistry>,
    stale_after: Duration,
    sweep_interval: Duration,
}

impl Reaper {
    pub fn new(registry: Arc<SessionRegistry>, config: &ReaperConfig) -> Self {
        Self {
            registry,
            stale_after: config.stale_after(),
            sweep_interval: config.sweep_interval(),
        }
    }

    /// Sessions idle for at least `stale_after` as of `now`
    pub fn stale_sessions(&self, now: Instant) -> Vec<String> {
        self.registry
            .activity()
            .snapshot()
            .into_iter()
            .filter(|(_, last_seen)| now.saturating_duration_since(*last_seen) >= self.stale_after)
            .map(|(id, _)| id)
            .collect()
    }

    /// Run one sweep as of `now`, returning what was finalized
    pub async fn sweep_at(&self, now: Instant) -> Vec<CompletionRecord> {
        let stale = self.stale_sessions(now);
        if stale.is_empty() {
            return Vec::new();
        }

        info!("Reaper found {} stale session(s)", stale.len());

        let mut finalized = Vec::with_capacity(stale.len());
        for session_id in stale {
            match self.registry.finalize(&session_id).await {
                Ok(record) => {
                    info!("Reaped stale session {} ({})", session_id, record.file_name);
                    finalized.push(record);
                }
                Err(SessionError::NotFound(_)) => {
                    debug!("Stale session {} already finalized", session_id);
                }
                Err(e) => warn!("Failed to reap session {}: {}", session_id, e),
            }
        }
        finalized
    }

    pub async fn sweep(&self) -> Vec<CompletionRecord> {
        self.sweep_at(Instant::now()).await
    }

    /// Sweep on a fixed period until shutdown is signalled
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Reaper started: sweep every {:?}, stale after {:?}",
            self.sweep_interval, self.stale_after
        );

        let mut ticker = tokio::time::interval_at(
            Instant::now() + self.sweep_interval,
            self.sweep_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Reaper stopped");
    }
}

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use super::messages::RecordCompletedEvent;
use crate::session::CompletionRecord;

/// Downstream event bus
///
/// Implementations deliver asynchronously; a returned error means this event
/// was not delivered and will not be retried.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<()>;
}

/// Producer side of the completion queue, held by the session registry
///
/// `emit` never waits on the event bus.
#[derive(Debug, Clone)]
pub struct CompletionEmitter {
    tx: mpsc::UnboundedSender<CompletionRecord>,
}

impl CompletionEmitter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<CompletionRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a record for delivery. Returns false if the worker is gone.
    pub fn emit(&self, record: CompletionRecord) -> bool {
        match self.tx.send(record) {
            Ok(()) => true,
            Err(mpsc::error::SendError(record)) => {
                error!(
                    "Completion worker stopped; event for session {} ({}) not delivered",
                    record.session_id, record.file_name
                );
                false
            }
        }
    }
}

/// Result of handing one completion to the event bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { session_id: String },
    Failed { session_id: String, reason: String },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Counts reported when the worker stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryTally {
    pub delivered: usize,
    pub failed: usize,
}

/// Drains the completion queue into an `EventSink`
pub struct CompletionWorker<S> {
    rx: mpsc::UnboundedReceiver<CompletionRecord>,
    sink: S,
    subject: String,
}

impl<S: EventSink> CompletionWorker<S> {
    pub fn new(
        rx: mpsc::UnboundedReceiver<CompletionRecord>,
        sink: S,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            rx,
            sink,
            subject: subject.into(),
        }
    }

    /// Publish one record and log the outcome
    pub async fn deliver(&self, record: &CompletionRecord) -> DeliveryOutcome {
        let event = RecordCompletedEvent::from(record);
        let payload = match serde_json::to_vec(&event) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to encode completion for session {}: {}", record.session_id, e);
                return DeliveryOutcome::Failed {
                    session_id: record.session_id.clone(),
                    reason: e.to_string(),
                };
            }
        };

        match self
            .sink
            .publish(&self.subject, &record.session_id, payload)
            .await
        {
            Ok(()) => {
                info!(
                    "Published completion: subject={} session={} file={}",
                    self.subject, record.session_id, record.file_name
                );
                DeliveryOutcome::Delivered {
                    session_id: record.session_id.clone(),
                }
            }
            Err(e) => {
                error!(
                    "Failed to publish completion: subject={} session={} file={}: {:#}",
                    self.subject, record.session_id, record.file_name, e
                );
                DeliveryOutcome::Failed {
                    session_id: record.session_id.clone(),
                    reason: format!("{:#}", e),
                }
            }
        }
    }

    /// Deliver records until every emitter is dropped or shutdown is signalled
    ///
    /// Records already queued when shutdown arrives are still delivered. The
    /// sink is handed back so the caller can close it once the queue is empty.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> (DeliveryTally, S) {
        info!("Completion worker started (subject: {})", self.subject);
        let mut tally = DeliveryTally::default();

        loop {
            let next = tokio::select! {
                next = self.rx.recv() => next,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        None
                    } else {
                        continue;
                    }
                }
            };

            match next {
                Some(record) => self.record_outcome(&record, &mut tally).await,
                None => break,
            }
        }

        while let Ok(record) = self.rx.try_recv() {
            self.record_outcome(&record, &mut tally).await;
        }

        if tally.failed > 0 {
            warn!(
                "Completion worker stopped: {} delivered, {} failed",
                tally.delivered, tally.failed
            );
        } else {
            info!("Completion worker stopped: {} delivered", tally.delivered);
        }
        (tally, self.sink)
    }

    async fn record_outcome(&self, record: &CompletionRecord, tally: &mut DeliveryTally) {
        if self.deliver(record).await.is_delivered() {
            tally.delivered += 1;
        } else {
            tally.failed += 1;
        }
    }
}

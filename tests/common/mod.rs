// Shared fixtures for integration tests
#![allow(dead_code)]

use anyhow::{bail, Result};
use loqa_ingest::config::StorageConfig;
use loqa_ingest::{CompletionEmitter, CompletionRecord, EventSink, SessionRegistry};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub const CHUNK: &str = "data:audio/webm;base64,AAA=";

/// Registry writing into `root`, plus the receiving end of its completion queue
pub fn registry_in(root: &Path) -> (Arc<SessionRegistry>, mpsc::UnboundedReceiver<CompletionRecord>) {
    let (emitter, completions) = CompletionEmitter::channel();
    let registry = Arc::new(SessionRegistry::new(StorageConfig::new(root), emitter));
    (registry, completions)
}

/// Everything emitted so far, without waiting
pub fn drain(completions: &mut mpsc::UnboundedReceiver<CompletionRecord>) -> Vec<CompletionRecord> {
    let mut records = Vec::new();
    while let Ok(record) = completions.try_recv() {
        records.push(record);
    }
    records
}

/// In-memory event bus
#[derive(Clone, Default)]
pub struct MemorySink {
    pub published: Arc<Mutex<Vec<(String, String, Vec<u8>)>>>,
    pub fail: bool,
}

impl MemorySink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn published(&self) -> Vec<(String, String, Vec<u8>)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl EventSink for MemorySink {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<()> {
        if self.fail {
            bail!("broker unavailable");
        }
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), key.to_string(), payload));
        Ok(())
    }
}

use anyhow::{Context, Result};
use async_nats::{Client, HeaderMap};
use tracing::{debug, info};

use super::emitter::EventSink;

/// Header carrying the event key (the session id)
pub const EVENT_KEY_HEADER: &str = "Event-Key";

pub struct NatsClient {
    client: Client,
}

impl NatsClient {
    /// Connect to NATS server
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self { client })
    }

    /// Close NATS connection
    pub async fn close(self) -> Result<()> {
        info!("Closing NATS connection");
        self.client
            .flush()
            .await
            .context("Failed to flush NATS connection")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl EventSink for NatsClient {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<()> {
        let mut headers = HeaderMap::new();
        headers.insert(EVENT_KEY_HEADER, key);
        // Lets a JetStream-backed subject drop duplicates of the same completion
        headers.insert("Nats-Msg-Id", key);

        let bytes = payload.len();
        self.client
            .publish_with_headers(topic.to_string(), headers, payload.into())
            .await
            .context("Failed to publish event")?;
        self.client
            .flush()
            .await
            .context("Failed to flush published event")?;

        debug!("Published {} bytes to {} (key={})", bytes, topic, key);
        Ok(())
    }
}

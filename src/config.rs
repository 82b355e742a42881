use anyhow::{bail, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub reaper: ReaperConfig,
    pub nats: NatsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory that receives one file per recording (created on first use)
    pub recordings_path: PathBuf,
    /// Extension given to recording files, without the dot
    pub file_extension: String,
}

impl StorageConfig {
    pub fn new(recordings_path: impl Into<PathBuf>) -> Self {
        Self {
            recordings_path: recordings_path.into(),
            file_extension: "webm".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReaperConfig {
    /// Inactivity after which a session is finalized
    pub stale_after_secs: u64,
    /// How often the reaper looks for stale sessions
    pub sweep_interval_secs: u64,
}

impl ReaperConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    pub url: String,
    /// Subject that receives one event per finished recording
    pub completion_subject: String,
}

impl Config {
    /// Load configuration from defaults, an optional file, and `LOQA_INGEST__*` env vars
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("service.name", "loqa-ingest")?
            .set_default("service.http.bind", "0.0.0.0")?
            .set_default("service.http.port", 8080)?
            .set_default("storage.recordings_path", "recordings")?
            .set_default("storage.file_extension", "webm")?
            .set_default("reaper.stale_after_secs", 1800)?
            .set_default("reaper.sweep_interval_secs", 180)?
            .set_default("nats.url", "nats://localhost:4222")?
            .set_default("nats.completion_subject", "audio.record.completed")?
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("LOQA_INGEST")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let reaper = &self.reaper;
        if reaper.sweep_interval_secs == 0 {
            bail!("reaper.sweep_interval_secs must be greater than zero");
        }
        if reaper.sweep_interval_secs >= reaper.stale_after_secs {
            bail!(
                "reaper.sweep_interval_secs ({}) must be smaller than reaper.stale_after_secs ({})",
                reaper.sweep_interval_secs,
                reaper.stale_after_secs
            );
        }
        if reaper.sweep_interval_secs * 10 > reaper.stale_after_secs {
            warn!(
                "Reaper sweeps every {}s against a {}s threshold; stale sessions may linger up to {}s",
                reaper.sweep_interval_secs,
                reaper.stale_after_secs,
                reaper.stale_after_secs + reaper.sweep_interval_secs
            );
        }
        let ext = &self.storage.file_extension;
        if ext.is_empty() || ext.contains(|c| c == '/' || c == '.') {
            bail!("storage.file_extension must be a bare extension, got {:?}", ext);
        }
        Ok(())
    }
}

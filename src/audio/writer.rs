use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::chunk::decode_chunk;
use crate::config::StorageConfig;
use crate::error::{Result, SessionError};

const BUFFER_SIZE: usize = 32 * 1024;

/// Append-only sink for one recording
///
/// Every chunk is flushed before `write_chunk` returns, so a crash loses at
/// most the chunk in flight.
pub struct StreamWriter {
    writer: Option<BufWriter<File>>,
    file_path: PathBuf,
    file_name: String,
    bytes_written: u64,
}

impl StreamWriter {
    /// Create `<root>/<recording_id>_<yyyyMMdd_HHmmssSSS>.<ext>`
    pub fn create(
        storage: &StorageConfig,
        recording_id: &str,
        created_at: DateTime<Local>,
    ) -> Result<Self> {
        let root = &storage.recordings_path;
        fs::create_dir_all(root).map_err(|source| SessionError::StorageUnavailable {
            path: root.clone(),
            source,
        })?;

        let file_name = file_name_for(recording_id, created_at, &storage.file_extension);
        let file_path = root.join(&file_name);

        // create_new: two sessions sharing a metaId in the same millisecond must not clobber each other
        let file = File::options()
            .write(true)
            .create_new(true)
            .open(&file_path)
            .map_err(|source| SessionError::StorageUnavailable {
                path: file_path.clone(),
                source,
            })?;

        info!("Opened recording file: {}", file_path.display());

        Ok(Self {
            writer: Some(BufWriter::with_capacity(BUFFER_SIZE, file)),
            file_path,
            file_name,
            bytes_written: 0,
        })
    }

    /// Decode a chunk and append it. Returns the number of bytes written.
    ///
    /// A chunk that fails to decode is dropped and leaves the sink open.
    pub fn write_chunk(&mut self, chunk: &str) -> Result<usize> {
        let bytes = decode_chunk(chunk)?;
        self.write_bytes(&bytes)?;
        Ok(bytes.len())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(SessionError::WriteFailure {
                path: self.file_path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "writer is closed"),
            });
        };

        writer
            .write_all(bytes)
            .and_then(|_| writer.flush())
            .map_err(|source| SessionError::WriteFailure {
                path: self.file_path.clone(),
                source,
            })?;

        self.bytes_written += bytes.len() as u64;
        debug!("Appended {} bytes to {}", bytes.len(), self.file_name);
        Ok(())
    }

    /// Flush and release the file. Closing twice is a no-op.
    ///
    /// Does not fsync; see [`sync_to_disk`].
    pub fn close(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.into_inner().map_err(|e| SessionError::WriteFailure {
                path: self.file_path.clone(),
                source: e.into_error(),
            })?;
            info!(
                "Closed recording file: {} ({} bytes)",
                self.file_path.display(),
                self.bytes_written
            );
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

impl Drop for StreamWriter {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                warn!("Failed to flush {} on drop: {}", self.file_path.display(), e);
            }
        }
    }
}

/// Force a closed recording to stable storage on the blocking pool
pub async fn sync_to_disk(path: PathBuf) -> Result<()> {
    let target = path.clone();
    let synced =
        tokio::task::spawn_blocking(move || File::options().append(true).open(&target)?.sync_all())
            .await;

    match synced {
        Ok(result) => result.map_err(|source| SessionError::WriteFailure { path, source }),
        Err(e) => Err(SessionError::WriteFailure {
            path,
            source: std::io::Error::new(std::io::ErrorKind::Other, e),
        }),
    }
}

fn file_name_for(recording_id: &str, created_at: DateTime<Local>, extension: &str) -> String {
    format!(
        "{}_{}.{}",
        sanitize_file_stem(recording_id),
        created_at.format("%Y%m%d_%H%M%S%3f"),
        extension
    )
}

/// Client-supplied recording ids are labels, never paths
fn sanitize_file_stem(recording_id: &str) -> String {
    let cleaned: String = recording_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "recording".to_string()
    } else {
        trimmed.to_string()
    }
}

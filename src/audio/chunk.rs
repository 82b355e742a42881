use base64::Engine;

use crate::error::DecodeError;

/// Decode one chunk payload of the form `<metadata prefix>,<base64 data>`
///
/// Browsers deliver `MediaRecorder` blobs as data URLs
/// (`data:audio/webm;codecs=opus;base64,GkXf...`), so everything up to the
/// first comma is treated as the prefix and ignored.
pub fn decode_chunk(chunk: &str) -> Result<Vec<u8>, DecodeError> {
    let (_prefix, data) = chunk.split_once(',').ok_or(DecodeError::MissingBoundary)?;

    let bytes = base64::engine::general_purpose::STANDARD.decode(data.trim())?;

    Ok(bytes)
}

//! Text-frame codec for realtime events.
//!
//! Frames are JSON documents carried in WebSocket text messages. Both sides
//! share these helpers so the size limit and error mapping stay identical.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Largest accepted frame, in bytes.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Frame exceeds [`MAX_FRAME_LEN`].
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

/// Encodes a frame as a JSON string.
///
/// # Errors
///
/// Returns `CodecError::Serialization` if the value cannot be serialized, or
/// `CodecError::InvalidFrame` if the result exceeds [`MAX_FRAME_LEN`].
pub fn encode<F: Serialize>(frame: &F) -> Result<String, CodecError> {
    let text = serde_json::to_string(frame).map_err(|e| CodecError::Serialization(e.to_string()))?;
    check_len(text.len())?;
    Ok(text)
}

/// Decodes a frame from a JSON string.
///
/// # Errors
///
/// Returns `CodecError::InvalidFrame` for oversized input, or
/// `CodecError::Serialization` for malformed JSON and unknown event names.
pub fn decode<F: DeserializeOwned>(text: &str) -> Result<F, CodecError> {
    check_len(text.len())?;
    serde_json::from_str(text).map_err(|e| CodecError::Serialization(e.to_string()))
}

fn check_len(len: usize) -> Result<(), CodecError> {
    if len > MAX_FRAME_LEN {
        return Err(CodecError::InvalidFrame(format!(
            "frame is {len} bytes (max {MAX_FRAME_LEN})"
        )));
    }
    Ok(())
}

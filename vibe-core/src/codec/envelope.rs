//! Base64 transport envelope.
//!
//! The live session carries binary audio inside JSON text frames, so payloads
//! travel as standard base64 plus a MIME tag declaring encoding and rate.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VibeError};

/// MIME tag for outbound microphone audio.
pub const MIME_PCM_16K: &str = "audio/pcm;rate=16000";

/// Sample rate of inbound synthesized audio (Hz, mono).
pub const INBOUND_SAMPLE_RATE: u32 = 24_000;

/// An encoded audio payload plus its format tag, ready to embed in a
/// `realtimeInput` message. Immutable once built; consumed by one send.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaEnvelope {
    /// Base64-encoded PCM bytes.
    pub data: String,
    /// Declared encoding + sample rate, e.g. `audio/pcm;rate=16000`.
    pub mime_type: String,
}

impl MediaEnvelope {
    /// Wrap raw PCM16 bytes as an outbound 16 kHz envelope.
    pub fn pcm_16k(bytes: &[u8]) -> Self {
        Self {
            data: encode_bytes(bytes),
            mime_type: MIME_PCM_16K.to_string(),
        }
    }
}

/// Encode bytes as standard padded base64.
pub fn encode_bytes(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decode standard base64 text back to bytes.
///
/// # Errors
/// `VibeError::Envelope` on non-alphabet characters or bad padding.
pub fn decode_str(text: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(text)
        .map_err(|e| VibeError::Envelope(e.to_string()))
}

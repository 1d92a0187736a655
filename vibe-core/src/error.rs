use thiserror::Error;

/// All errors produced by vibe-core.
#[derive(Debug, Error)]
pub enum VibeError {
    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default input device found")]
    NoDefaultInputDevice,

    #[error("no default output device found")]
    NoDefaultOutputDevice,

    #[error("malformed PCM payload: {0}")]
    MalformedPcm(String),

    #[error("envelope decode error: {0}")]
    Envelope(String),

    #[error("live session connect failed: {0}")]
    Connect(String),

    #[error("live session transport error: {0}")]
    Transport(String),

    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed API response: {0}")]
    MalformedResponse(String),

    #[error("a voice session is already active")]
    SessionActive,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, VibeError>;

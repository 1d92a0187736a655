//! # vibe-core
//!
//! Reusable voice-companion engine SDK.
//!
//! ## Architecture
//!
//! ```text
//! Microphone → MicCapture → SPSC RingBuffer → outbound pump (spawn_blocking)
//!                                                  │ resample → 16 kHz
//!                                                  │ PCM16 → base64 envelope
//!                                             LiveSession (WebSocket)
//!                                                  │ serverContent
//!                            ┌─────────────────────┴─────────────────┐
//!                       audio chunks                       transcriptions /
//!                            │                             interrupted /
//!                    PlaybackScheduler                     turnComplete
//!                            │                                  │
//!                     OutputSink (cpal)              broadcast event channels
//! ```
//!
//! Audio callbacks are zero-alloc and never block. All heap work happens on
//! worker threads or the tokio runtime.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod chat;
pub mod codec;
pub mod error;
pub mod events;
pub mod gemini;
pub mod mood;
pub mod playback;
pub mod recommend;
pub mod session;

// Convenience re-exports for downstream crates
pub use chat::{ChatThread, Message, Role};
pub use error::VibeError;
pub use events::{
    ActivityEvent, SessionErrorEvent, SessionStatus, SessionStatusEvent, Speaker, TranscriptEvent,
};
pub use gemini::{GeminiClient, GeminiConfig};
pub use mood::{Mood, VibePoint, VibeState};
pub use playback::{OutputClock, PlaybackScheduler};
pub use recommend::{Intensity, Recommendation, RecommendationKind};
pub use session::{VoiceSession, VoiceSessionConfig};

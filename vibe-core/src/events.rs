//! Event types broadcast by the voice session to the front end.
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` (camelCase) so
//! a UI process can forward them over any JSON channel unchanged.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Transcripts
// ---------------------------------------------------------------------------

/// Emitted whenever the remote session delivers transcription text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    /// Transcribed text fragment.
    pub text: String,
    /// Who was transcribed.
    pub speaker: Speaker,
}

/// Speaker tag on a transcript fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The human on the microphone (input transcription).
    User,
    /// The companion voice (output transcription).
    Model,
}

// ---------------------------------------------------------------------------
// Session status
// ---------------------------------------------------------------------------

/// Emitted when the session state machine transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusEvent {
    pub status: SessionStatus,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}

/// Voice session lifecycle state.
///
/// `Idle → Connecting → Active → (Idle | Error)`; `stop()` returns to `Idle`
/// from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// No session; `start()` is valid.
    Idle,
    /// Local resources opening, remote handshake pending.
    Connecting,
    /// Capturing and playing; remote wiring live (or queueing, see docs).
    Active,
    /// Start failed or the session died; `stop()` resets to `Idle`.
    Error,
}

// ---------------------------------------------------------------------------
// Speaking activity
// ---------------------------------------------------------------------------

/// Emitted when either side starts or stops speaking.
///
/// `user_speaking` flips on input transcription and off at turn completion;
/// `model_speaking` follows the playback scheduler's active-source set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    pub user_speaking: bool,
    pub model_speaking: bool,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Emitted when the remote session or local pipeline reports a failure.
///
/// Non-fatal errors (`fatal == false`) are informational — the session keeps
/// running, matching the report-only contract of the remote error channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionErrorEvent {
    pub message: String,
    pub fatal: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_event_serializes_with_lowercase_speaker() {
        let event = TranscriptEvent {
            seq: 3,
            text: "hello there".into(),
            speaker: Speaker::Model,
        };

        let json = serde_json::to_value(&event).expect("serialize transcript event");
        assert_eq!(json["seq"], 3);
        assert_eq!(json["text"], "hello there");
        assert_eq!(json["speaker"], "model");

        let round_trip: TranscriptEvent =
            serde_json::from_value(json).expect("deserialize transcript event");
        assert_eq!(round_trip.speaker, Speaker::Model);
    }

    #[test]
    fn activity_event_uses_camel_case_fields() {
        let event = ActivityEvent {
            seq: 9,
            user_speaking: true,
            model_speaking: false,
        };

        let json = serde_json::to_value(&event).expect("serialize activity event");
        assert_eq!(json["userSpeaking"], true);
        assert_eq!(json["modelSpeaking"], false);
        assert!(json.get("user_speaking").is_none());
    }

    #[test]
    fn session_status_round_trips_lowercase() {
        let json = serde_json::to_value(SessionStatus::Connecting).unwrap();
        assert_eq!(json, "connecting");
        let status: SessionStatus = serde_json::from_value(json).unwrap();
        assert_eq!(status, SessionStatus::Connecting);
        assert!(serde_json::from_str::<SessionStatus>(r#""Connecting""#).is_err());
    }
}

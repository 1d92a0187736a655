//! Thin clients for the hosted generative-language API.
//!
//! Two surfaces over the same model family:
//!
//! - [`rest`] — request/response `generateContent` for text chat and
//!   constrained-JSON recommendations
//! - [`live`] — bidirectional WebSocket streaming for the real-time voice
//!   session
//!
//! Everything here is transport plumbing; conversational behavior lives in
//! [`crate::chat`] / [`crate::recommend`] / [`crate::session`].

pub mod live;
pub mod rest;
pub mod wire;

pub use rest::GeminiClient;

/// Default REST endpoint base.
pub const DEFAULT_REST_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default live (bidirectional streaming) WebSocket endpoint.
pub const DEFAULT_WS_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContent";

/// Default text chat / recommendation model.
pub const DEFAULT_CHAT_MODEL: &str = "gemini-3-flash-preview";

/// Default native-audio live model.
pub const DEFAULT_LIVE_MODEL: &str = "models/gemini-2.5-flash-native-audio-preview-12-2025";

/// Default prebuilt voice for synthesized speech.
pub const DEFAULT_VOICE: &str = "Kore";

/// Default system persona for the voice companion.
pub const DEFAULT_PERSONA: &str = "You are \"VibeMaster\", an AI companion designed to boost the user's mood. Your voice should be expressive, empathetic, and full of life. You can tell jokes, offer exercises, or just listen. You are fluent in all languages.";

/// Connection settings shared by both API surfaces.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub rest_endpoint: String,
    pub ws_endpoint: String,
    pub chat_model: String,
    pub live_model: String,
    /// Prebuilt voice identifier for the live session.
    pub voice_name: String,
    /// System instruction declared at live-session setup.
    pub persona: String,
}

impl GeminiConfig {
    /// Config with stock endpoints, models, voice and persona.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            rest_endpoint: DEFAULT_REST_ENDPOINT.to_string(),
            ws_endpoint: DEFAULT_WS_ENDPOINT.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            live_model: DEFAULT_LIVE_MODEL.to_string(),
            voice_name: DEFAULT_VOICE.to_string(),
            persona: DEFAULT_PERSONA.to_string(),
        }
    }
}

//! Serde types for the generative-language wire protocol.
//!
//! Shared between the REST `generateContent` surface and the bidirectional
//! live WebSocket. Field casing follows the service's JSON (camelCase);
//! optional fields are omitted from serialized output entirely rather than
//! sent as null.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::envelope::MediaEnvelope;

// ---------------------------------------------------------------------------
// Shared content types
// ---------------------------------------------------------------------------

/// A piece of conversational content: one or more parts with an optional role.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Content {
    /// A single user-text content block.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![Part::text(text)],
            role: Some("user".into()),
        }
    }

    /// A bare text block with no role (used for system instructions).
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![Part::text(text)],
            role: None,
        }
    }
}

/// One part of a content block: text and/or inline binary data.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<MediaEnvelope>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }
}

/// Generation tuning knobs. Only the fields a given call sets are serialized.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
}

/// Voice selection for audio responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

impl SpeechConfig {
    pub fn prebuilt(voice_name: impl Into<String>) -> Self {
        Self {
            voice_config: VoiceConfig {
                prebuilt_voice_config: PrebuiltVoiceConfig {
                    voice_name: voice_name.into(),
                },
            },
        }
    }
}

// ---------------------------------------------------------------------------
// REST generateContent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerateContentResponse {
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Candidate {
    pub content: Option<Content>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, or empty when the model
    /// returned nothing usable.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Live session (bidirectional WebSocket)
// ---------------------------------------------------------------------------

/// First client frame: declares model, modality, voice, persona, and that
/// both transcription streams are wanted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupMessage {
    pub setup: Setup,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    /// Empty object opts in to user-speech transcription.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<Value>,
    /// Empty object opts in to model-speech transcription.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_transcription: Option<Value>,
}

/// Streaming client frame carrying captured audio.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInputMessage {
    pub realtime_input: RealtimeInput,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<MediaEnvelope>,
}

impl RealtimeInputMessage {
    pub fn single(envelope: MediaEnvelope) -> Self {
        Self {
            realtime_input: RealtimeInput {
                media_chunks: vec![envelope],
            },
        }
    }
}

/// Any server frame. Unknown fields are ignored so protocol additions do not
/// break the client.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerMessage {
    pub setup_complete: Option<Value>,
    pub server_content: Option<ServerContent>,
}

/// Body of a content-bearing server frame. Any combination of fields may be
/// present in one message.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerContent {
    pub model_turn: Option<Content>,
    pub interrupted: Option<bool>,
    pub turn_complete: Option<bool>,
    pub input_transcription: Option<Transcription>,
    pub output_transcription: Option<Transcription>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Transcription {
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::envelope::MIME_PCM_16K;

    #[test]
    fn realtime_input_serializes_with_media_chunks_casing() {
        let msg = RealtimeInputMessage::single(MediaEnvelope {
            data: "AAAA".into(),
            mime_type: MIME_PCM_16K.into(),
        });
        let json = serde_json::to_value(&msg).expect("serialize realtime input");
        assert_eq!(json["realtimeInput"]["mediaChunks"][0]["data"], "AAAA");
        assert_eq!(
            json["realtimeInput"]["mediaChunks"][0]["mimeType"],
            MIME_PCM_16K
        );
    }

    #[test]
    fn setup_omits_unset_fields() {
        let msg = SetupMessage {
            setup: Setup {
                model: "models/test".into(),
                generation_config: GenerationConfig {
                    response_modalities: Some(vec!["AUDIO".into()]),
                    speech_config: Some(SpeechConfig::prebuilt("Kore")),
                    ..Default::default()
                },
                system_instruction: Some(Content::text("be kind")),
                input_audio_transcription: Some(serde_json::json!({})),
                output_audio_transcription: Some(serde_json::json!({})),
            },
        };
        let json = serde_json::to_value(&msg).expect("serialize setup");
        let setup = &json["setup"];
        assert_eq!(setup["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            setup["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
                ["voiceName"],
            "Kore"
        );
        assert_eq!(setup["systemInstruction"]["parts"][0]["text"], "be kind");
        assert!(setup["generationConfig"].get("temperature").is_none());
        assert!(setup.get("inputAudioTranscription").is_some());
    }

    #[test]
    fn server_message_parses_audio_and_flags() {
        let raw = r#"{
            "serverContent": {
                "modelTurn": { "parts": [ { "inlineData": { "data": "UENN", "mimeType": "audio/pcm;rate=24000" } } ] },
                "interrupted": true,
                "turnComplete": true,
                "outputTranscription": { "text": "hi!" }
            }
        }"#;
        let msg: ServerMessage = serde_json::from_str(raw).expect("parse server message");
        let content = msg.server_content.expect("server content");
        assert_eq!(content.interrupted, Some(true));
        assert_eq!(content.turn_complete, Some(true));
        assert_eq!(content.output_transcription.unwrap().text, "hi!");
        let turn = content.model_turn.unwrap();
        assert_eq!(turn.parts[0].inline_data.as_ref().unwrap().data, "UENN");
    }

    #[test]
    fn server_message_tolerates_unknown_fields() {
        let raw = r#"{ "usageMetadata": { "totalTokenCount": 12 } }"#;
        let msg: ServerMessage = serde_json::from_str(raw).expect("parse");
        assert!(msg.setup_complete.is_none());
        assert!(msg.server_content.is_none());
    }

    #[test]
    fn response_text_joins_first_candidate_parts() {
        let raw = r#"{
            "candidates": [
                { "content": { "parts": [ { "text": "Hello " }, { "text": "vibe." } ], "role": "model" } }
            ]
        }"#;
        let resp: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.text(), "Hello vibe.");

        let empty: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.text(), "");
    }
}

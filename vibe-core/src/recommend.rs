//! Mood-tailored content recommendations.
//!
//! One constrained-JSON `generateContent` call per refresh: the model is
//! asked for four diverse items (an activity, an exercise, a joke/roast, a
//! quote/story) matching the current mood, with the shape pinned by a
//! response schema. A reply that fails to parse yields an empty list rather
//! than an error — a missing card row is not worth failing the caller for.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::error::Result;
use crate::gemini::wire::{Content, GenerateContentRequest, GenerationConfig};
use crate::gemini::GeminiClient;
use crate::mood::Mood;

/// What kind of content a recommendation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationKind {
    Activity,
    Exercise,
    Joke,
    Story,
    Quote,
    Roast,
}

/// How intense the suggested content is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Low,
    Medium,
    High,
}

/// One recommendation card's worth of data (presentation is the UI's job).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    pub title: String,
    pub content: String,
    pub intensity: Intensity,
}

/// Response schema constraining the model's JSON output.
fn recommendation_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "id": { "type": "STRING" },
                "type": { "type": "STRING" },
                "title": { "type": "STRING" },
                "content": { "type": "STRING" },
                "intensity": { "type": "STRING" },
            },
            "required": ["id", "type", "title", "content", "intensity"],
        },
    })
}

/// Fetch four recommendations tailored to `mood`.
///
/// # Errors
/// Propagates transport/API failures; a syntactically bad model reply is
/// logged and returned as an empty list instead.
pub async fn fetch_for_mood(client: &GeminiClient, mood: Mood) -> Result<Vec<Recommendation>> {
    let prompt = format!(
        "Generate 4 diverse recommendations for someone feeling {mood}. \
         Include one activity, one exercise, one joke/roast, and one quote/story."
    );

    let request = GenerateContentRequest {
        contents: vec![Content::user_text(prompt)],
        generation_config: Some(GenerationConfig {
            response_mime_type: Some("application/json".into()),
            response_schema: Some(recommendation_schema()),
            ..Default::default()
        }),
        system_instruction: None,
    };

    let raw = client.generate(&client.config().chat_model, &request).await?;

    match serde_json::from_str::<Vec<Recommendation>>(raw.trim()) {
        Ok(recs) => Ok(recs),
        Err(e) => {
            warn!("failed to parse recommendations: {e}");
            Ok(Vec::new())
        }
    }
}

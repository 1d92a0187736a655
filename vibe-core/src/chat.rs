//! Mood-conditioned text conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::gemini::wire::{Content, GenerateContentRequest, GenerationConfig};
use crate::gemini::GeminiClient;
use crate::mood::Mood;

/// Reply used when the model returns no usable text.
const FALLBACK_REPLY: &str = "I'm processing your vibe right now...";

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One chat message in the thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: u64,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// An append-only conversation thread.
#[derive(Debug, Default)]
pub struct ChatThread {
    messages: Vec<Message>,
    next_id: u64,
}

impl ChatThread {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Send one user message and append both sides of the exchange.
    ///
    /// The prompt folds in the current mood so the reply adapts its register:
    /// empathy for sadness, humor for boredom, a witty-but-safe roast for
    /// venting.
    pub async fn send(
        &mut self,
        client: &GeminiClient,
        text: &str,
        mood: Mood,
        language: &str,
    ) -> Result<String> {
        let prompt = build_vibe_prompt(text, mood, language);
        debug!(%mood, language, "chat turn");

        let request = GenerateContentRequest {
            contents: vec![Content::user_text(prompt)],
            generation_config: Some(GenerationConfig {
                temperature: Some(0.8),
                top_k: Some(40),
                top_p: Some(0.9),
                ..Default::default()
            }),
            system_instruction: None,
        };

        let raw = client.generate(&client.config().chat_model, &request).await?;
        let reply = if raw.trim().is_empty() {
            FALLBACK_REPLY.to_string()
        } else {
            raw
        };

        self.push(Role::User, text.to_string());
        self.push(Role::Assistant, reply.clone());
        Ok(reply)
    }

    fn push(&mut self, role: Role, text: String) {
        let id = self.next_id;
        self.next_id += 1;
        self.messages.push(Message {
            id,
            role,
            text,
            timestamp: Utc::now(),
        });
    }
}

/// The mood-flavored prompt wrapper around a raw user message.
fn build_vibe_prompt(text: &str, mood: Mood, language: &str) -> String {
    format!(
        "The user's current mood is {mood}. They said: \"{text}\". \
         The response should be in {language}. \
         Be engaging, helpful, and adapt your personality to fit the mood. \
         If they are sad, be empathetic. If they are bored, be funny. \
         If they want to vent about someone, provide a witty (but safe) roast."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_mood_message_and_language() {
        let prompt = build_vibe_prompt("rough day", Mood::Sad, "Spanish");
        assert!(prompt.contains("current mood is Sad"));
        assert!(prompt.contains("\"rough day\""));
        assert!(prompt.contains("in Spanish"));
    }

    #[test]
    fn thread_ids_are_sequential() {
        let mut thread = ChatThread::new();
        thread.push(Role::User, "hi".into());
        thread.push(Role::Assistant, "hey!".into());
        thread.push(Role::User, "how are you".into());
        let ids: Vec<u64> = thread.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(thread.messages()[1].role, Role::Assistant);
    }

    #[test]
    fn message_serializes_with_lowercase_role() {
        let msg = Message {
            id: 1,
            role: Role::Assistant,
            text: "hello".into(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
    }
}

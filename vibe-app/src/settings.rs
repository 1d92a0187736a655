//! Persistent application settings (JSON file in the user config directory).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vibe_core::GeminiConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    /// API key for the hosted model; the `GEMINI_API_KEY` env var and the
    /// `--api-key` flag both take precedence over this.
    pub api_key: Option<String>,
    pub chat_model: String,
    pub live_model: String,
    pub voice_name: String,
    pub persona: String,
    /// Language the text chat should answer in.
    pub language: String,
    pub preferred_input_device: Option<String>,
    /// When set, the outbound 16 kHz capture stream is tee'd to this WAV file.
    pub debug_capture_wav: Option<PathBuf>,
    pub history_enabled: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            chat_model: vibe_core::gemini::DEFAULT_CHAT_MODEL.into(),
            live_model: vibe_core::gemini::DEFAULT_LIVE_MODEL.into(),
            voice_name: vibe_core::gemini::DEFAULT_VOICE.into(),
            persona: vibe_core::gemini::DEFAULT_PERSONA.into(),
            language: "English".into(),
            preferred_input_device: None,
            debug_capture_wav: None,
            history_enabled: true,
        }
    }
}

impl AppSettings {
    /// Replace blank fields with their defaults so a hand-edited file can't
    /// wipe out a model name or persona by accident.
    pub fn normalize(&mut self) {
        let defaults = AppSettings::default();
        if self.chat_model.trim().is_empty() {
            self.chat_model = defaults.chat_model;
        }
        if self.live_model.trim().is_empty() {
            self.live_model = defaults.live_model;
        }
        if self.voice_name.trim().is_empty() {
            self.voice_name = defaults.voice_name;
        }
        if self.persona.trim().is_empty() {
            self.persona = defaults.persona;
        }
        if self.language.trim().is_empty() {
            self.language = defaults.language;
        }
        if let Some(key) = &self.api_key {
            if key.trim().is_empty() {
                self.api_key = None;
            }
        }
    }

    /// Build the core config from these settings plus a resolved API key.
    pub fn to_gemini_config(&self, api_key: String) -> GeminiConfig {
        let mut config = GeminiConfig::new(api_key);
        config.chat_model = self.chat_model.clone();
        config.live_model = self.live_model.clone();
        config.voice_name = self.voice_name.clone();
        config.persona = self.persona.clone();
        config
    }
}

/// Key resolution order: explicit flag, then environment, then settings file.
pub fn resolve_api_key(
    flag: Option<&str>,
    env_key: Option<&str>,
    settings: &AppSettings,
) -> Option<String> {
    flag.map(str::to_string)
        .filter(|k| !k.trim().is_empty())
        .or_else(|| {
            env_key
                .map(str::to_string)
                .filter(|k| !k.trim().is_empty())
        })
        .or_else(|| settings.api_key.clone())
}

/// Default path: `<config dir>/vibecheck/settings.json`.
pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vibecheck")
        .join("settings.json")
}

/// Default path for the vibe-history database, next to the settings file.
pub fn default_db_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vibecheck")
        .join("vibes.db")
}

/// Load settings, falling back to defaults when the file is missing or
/// unreadable. A fresh default file is written on first run.
pub fn load_settings(path: &Path) -> AppSettings {
    match fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str::<AppSettings>(&raw) {
            Ok(mut settings) => {
                settings.normalize();
                settings
            }
            Err(e) => {
                tracing::warn!("settings file unparseable ({e}), using defaults");
                AppSettings::default()
            }
        },
        Err(_) => {
            let settings = AppSettings::default();
            save_settings(path, &settings);
            settings
        }
    }
}

/// Best-effort save; failures are logged, not fatal.
pub fn save_settings(path: &Path, settings: &AppSettings) {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    match serde_json::to_string_pretty(settings) {
        Ok(raw) => {
            if let Err(e) = fs::write(path, raw) {
                tracing::warn!("failed to save settings: {e}");
            }
        }
        Err(e) => tracing::warn!("failed to serialize settings: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: AppSettings = serde_json::from_str(r#"{ "language": "German" }"#).unwrap();
        assert_eq!(settings.language, "German");
        assert_eq!(settings.chat_model, AppSettings::default().chat_model);
        assert!(settings.history_enabled);
    }

    #[test]
    fn normalize_restores_blanked_out_fields() {
        let mut settings = AppSettings {
            chat_model: "  ".into(),
            api_key: Some(String::new()),
            ..Default::default()
        };
        settings.normalize();
        assert_eq!(settings.chat_model, AppSettings::default().chat_model);
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn api_key_resolution_prefers_flag_then_env() {
        let settings = AppSettings {
            api_key: Some("from-file".into()),
            ..Default::default()
        };
        assert_eq!(
            resolve_api_key(Some("from-flag"), Some("from-env"), &settings).as_deref(),
            Some("from-flag")
        );
        assert_eq!(
            resolve_api_key(None, Some("from-env"), &settings).as_deref(),
            Some("from-env")
        );
        assert_eq!(
            resolve_api_key(None, None, &settings).as_deref(),
            Some("from-file")
        );
        assert_eq!(
            resolve_api_key(Some(""), None, &AppSettings::default()),
            None
        );
    }

    #[test]
    fn settings_serialize_camel_case() {
        let json = serde_json::to_value(AppSettings::default()).unwrap();
        assert!(json.get("chatModel").is_some());
        assert!(json.get("historyEnabled").is_some());
        assert!(json.get("chat_model").is_none());
    }
}

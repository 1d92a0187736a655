//! Mood model and vibe-score time series.
//!
//! How a mood gets *chosen* (sentiment heuristics, UI buttons) is the front
//! end's business; this module just keeps the canonical state and history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The tracked mood categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mood {
    Happy,
    Sad,
    Angry,
    Anxious,
    Bored,
    Neutral,
}

impl Mood {
    pub const ALL: [Mood; 6] = [
        Mood::Happy,
        Mood::Sad,
        Mood::Angry,
        Mood::Anxious,
        Mood::Bored,
        Mood::Neutral,
    ];

    /// Parse a user-supplied mood name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        Mood::ALL
            .into_iter()
            .find(|m| m.to_string().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mood::Happy => "Happy",
            Mood::Sad => "Sad",
            Mood::Angry => "Angry",
            Mood::Anxious => "Anxious",
            Mood::Bored => "Bored",
            Mood::Neutral => "Neutral",
        };
        f.write_str(name)
    }
}

/// One point in the vibe-score time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VibePoint {
    pub timestamp: DateTime<Utc>,
    /// Score in 0–100.
    pub score: u8,
    pub mood: Mood,
}

/// Current mood plus the recorded history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VibeState {
    pub current_mood: Mood,
    /// Score in 0–100; 50 is the neutral baseline.
    pub vibe_score: u8,
    pub history: Vec<VibePoint>,
}

impl VibeState {
    pub const BASELINE_SCORE: u8 = 50;
    pub const MAX_SCORE: u8 = 100;

    /// Fresh state: Neutral at the baseline, with one seed history point.
    pub fn new() -> Self {
        let mut state = Self {
            current_mood: Mood::Neutral,
            vibe_score: Self::BASELINE_SCORE,
            history: Vec::new(),
        };
        state.push_point();
        state
    }

    /// Record a mood report. Scores above 100 clamp down.
    pub fn record(&mut self, mood: Mood, score: u8) {
        self.current_mood = mood;
        self.vibe_score = score.min(Self::MAX_SCORE);
        self.push_point();
    }

    /// Nudge the score by `delta`, saturating at the 0/100 bounds, keeping
    /// the current mood.
    pub fn adjust(&mut self, delta: i16) {
        let next = (self.vibe_score as i16 + delta).clamp(0, Self::MAX_SCORE as i16);
        self.vibe_score = next as u8;
        self.push_point();
    }

    fn push_point(&mut self) {
        self.history.push(VibePoint {
            timestamp: Utc::now(),
            score: self.vibe_score,
            mood: self.current_mood,
        });
    }
}

impl Default for VibeState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_starts_neutral_with_seed_point() {
        let state = VibeState::new();
        assert_eq!(state.current_mood, Mood::Neutral);
        assert_eq!(state.vibe_score, 50);
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.history[0].score, 50);
    }

    #[test]
    fn record_clamps_and_appends() {
        let mut state = VibeState::new();
        state.record(Mood::Happy, 200);
        assert_eq!(state.vibe_score, 100);
        assert_eq!(state.current_mood, Mood::Happy);
        assert_eq!(state.history.len(), 2);
    }

    #[test]
    fn adjust_saturates_at_bounds() {
        let mut state = VibeState::new();
        state.adjust(-80);
        assert_eq!(state.vibe_score, 0);
        state.adjust(15);
        assert_eq!(state.vibe_score, 15);
        state.adjust(120);
        assert_eq!(state.vibe_score, 100);
    }

    #[test]
    fn history_timestamps_never_regress() {
        let mut state = VibeState::new();
        state.record(Mood::Bored, 40);
        state.adjust(5);
        for pair in state.history.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn mood_parse_is_case_insensitive() {
        assert_eq!(Mood::parse("anxious"), Some(Mood::Anxious));
        assert_eq!(Mood::parse(" HAPPY "), Some(Mood::Happy));
        assert_eq!(Mood::parse("melancholy"), None);
    }
}

use super::normalize::{normalize_score, truncate_chars, SCORE_MAX, SCORE_MIN};
use super::parse::RawStyle;
use super::types::{GenerationLimits, Locale};
use crate::concept::SongConcept;
use serde::{Deserialize, Serialize};

pub const DEFAULT_WEIRDNESS: u8 = 50;
pub const DEFAULT_STYLE_INFLUENCE: u8 = 65;

/// Production prompt and slider recommendations for a music model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedStyle {
    pub prompt: String,
    #[serde(default)]
    pub prompt_effect: String,
    /// Comma separated.
    #[serde(default)]
    pub similar_artists: String,
    pub weirdness: u8,
    pub style_influence: u8,
    #[serde(default)]
    pub recommendation_reason: String,
    /// Also serves as the editable "story" of the song.
    #[serde(default)]
    pub song_description: String,
}

/// Where a style prompt sits relative to the configured limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptLength {
    WithinTarget,
    /// Longer than requested, still accepted.
    OverTarget,
    /// Long enough that some music models may cut it.
    OverSoft,
    OverHard,
}

impl GeneratedStyle {
    /// Deterministic style used when the model answer cannot be parsed.
    pub fn fallback(concept: &SongConcept, locale: Locale) -> Self {
        let prompt = if concept.genre.is_empty() {
            "Ambient".to_string()
        } else {
            concept.genre.join(", ")
        };
        let (prompt_effect, similar_artists, recommendation_reason) = match locale {
            Locale::De => (
                "Erzeugt einen passenden Sound auf Basis des Themas.",
                "Diverse Einflüsse",
                "Empfehlung auf Basis von Genre und Stimmung, die Werte lassen sich nach Bedarf anpassen.",
            ),
            Locale::En => (
                "Produces a fitting sound based on the topic.",
                "Various influences",
                "Recommendation based on genre and mood, adjust the values as needed.",
            ),
        };
        Self {
            prompt,
            prompt_effect: prompt_effect.to_string(),
            similar_artists: similar_artists.to_string(),
            weirdness: DEFAULT_WEIRDNESS,
            style_influence: DEFAULT_STYLE_INFLUENCE,
            recommendation_reason: recommendation_reason.to_string(),
            song_description: concept.topic.trim().to_string(),
        }
    }

    /// Fills missing fields from [`GeneratedStyle::fallback`], clamps the
    /// sliders and cuts the prompt at the hard limit.
    pub fn from_raw(
        raw: RawStyle,
        concept: &SongConcept,
        locale: Locale,
        limits: &GenerationLimits,
    ) -> Self {
        let defaults = Self::fallback(concept, locale);
        let prompt = raw.prompt.unwrap_or(defaults.prompt);
        Self {
            prompt: truncate_chars(prompt.trim(), limits.style_prompt_hard),
            prompt_effect: raw.prompt_effect.unwrap_or(defaults.prompt_effect),
            similar_artists: raw.similar_artists.unwrap_or(defaults.similar_artists),
            weirdness: normalize_score(raw.weirdness.as_ref(), DEFAULT_WEIRDNESS),
            style_influence: normalize_score(raw.style_influence.as_ref(), DEFAULT_STYLE_INFLUENCE),
            recommendation_reason: raw
                .recommendation_reason
                .unwrap_or(defaults.recommendation_reason),
            song_description: raw.song_description.unwrap_or(defaults.song_description),
        }
    }

    pub fn similar_artists_list(&self) -> Vec<&str> {
        self.similar_artists
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn prompt_length(&self, limits: &GenerationLimits) -> PromptLength {
        let len = self.prompt.chars().count();
        if len > limits.style_prompt_hard {
            PromptLength::OverHard
        } else if len > limits.style_prompt_soft {
            PromptLength::OverSoft
        } else if len > limits.style_prompt_target {
            PromptLength::OverTarget
        } else {
            PromptLength::WithinTarget
        }
    }

    /// Pulls both sliders back into 15..=85.
    pub fn clamp_sliders(&mut self) {
        self.weirdness = self.weirdness.clamp(SCORE_MIN, SCORE_MAX);
        self.style_influence = self.style_influence.clamp(SCORE_MIN, SCORE_MAX);
    }

    /// Replaces the prompt with a user edit, keeping the hard limit.
    pub fn set_prompt(&mut self, prompt: &str, limits: &GenerationLimits) {
        self.prompt = truncate_chars(prompt.trim(), limits.style_prompt_hard);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn concept() -> SongConcept {
        let mut concept = SongConcept::with_topic("Neon rain over Osaka");
        concept.genre = vec!["City Pop".to_string(), "Funk".to_string()];
        concept
    }

    #[test]
    fn test_fallback_uses_genres_and_topic() {
        let style = GeneratedStyle::fallback(&concept(), Locale::En);
        assert_eq!(style.prompt, "City Pop, Funk");
        assert_eq!(style.song_description, "Neon rain over Osaka");
        assert_eq!(style.weirdness, 50);
        assert_eq!(style.style_influence, 65);
        assert_eq!(style.similar_artists, "Various influences");
    }

    #[test]
    fn test_fallback_without_genre_is_ambient() {
        let style = GeneratedStyle::fallback(&SongConcept::default(), Locale::De);
        assert_eq!(style.prompt, "Ambient");
        assert_eq!(style.similar_artists, "Diverse Einflüsse");
    }

    #[test]
    fn test_from_raw_clamps_scores() {
        let raw = RawStyle {
            prompt: Some("City pop, 112 BPM, straight".to_string()),
            weirdness: Some(json!(0.9)),
            style_influence: Some(json!(5)),
            ..Default::default()
        };
        let style = GeneratedStyle::from_raw(raw, &concept(), Locale::En, &GenerationLimits::default());
        assert_eq!(style.weirdness, 85);
        assert_eq!(style.style_influence, 15);
        assert_eq!(style.prompt, "City pop, 112 BPM, straight");
        // Missing fields come from the fallback
        assert_eq!(style.song_description, "Neon rain over Osaka");
    }

    #[test]
    fn test_from_raw_truncates_prompt_at_hard_limit() {
        let limits = GenerationLimits {
            style_prompt_hard: 10,
            ..Default::default()
        };
        let raw = RawStyle {
            prompt: Some("abcdefghijklmnop".to_string()),
            ..Default::default()
        };
        let style = GeneratedStyle::from_raw(raw, &concept(), Locale::En, &limits);
        assert_eq!(style.prompt, "abcdefghij");
    }

    #[test]
    fn test_prompt_length_classification() {
        let limits = GenerationLimits {
            style_prompt_target: 5,
            style_prompt_soft: 10,
            style_prompt_hard: 20,
            ..Default::default()
        };
        let mut style = GeneratedStyle::fallback(&concept(), Locale::En);
        style.prompt = "abc".to_string();
        assert_eq!(style.prompt_length(&limits), PromptLength::WithinTarget);
        style.prompt = "abcdefg".to_string();
        assert_eq!(style.prompt_length(&limits), PromptLength::OverTarget);
        style.prompt = "abcdefghijklm".to_string();
        assert_eq!(style.prompt_length(&limits), PromptLength::OverSoft);
        style.set_prompt(&"x".repeat(50), &limits);
        assert_eq!(style.prompt.len(), 20);
    }

    #[test]
    fn test_similar_artists_list() {
        let mut style = GeneratedStyle::fallback(&concept(), Locale::En);
        style.similar_artists = "Tatsuro Yamashita,  Mariya Takeuchi, ".to_string();
        assert_eq!(
            style.similar_artists_list(),
            vec!["Tatsuro Yamashita", "Mariya Takeuchi"]
        );
    }

    #[test]
    fn test_style_json_shape() {
        let style = GeneratedStyle::fallback(&concept(), Locale::En);
        let json = serde_json::to_value(&style).unwrap();
        assert_eq!(json["styleInfluence"], 65);
        assert_eq!(json["recommendationReason"], style.recommendation_reason);
    }
}

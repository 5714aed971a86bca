//! Merging of AI suggestions into a user-edited concept.

use super::models::{AudioAnalysis, PartialSongConcept, SongConcept};

/// Fills every empty attribute list of `base` from `suggestions`.
///
/// Values the user already chose are never overwritten. Instrumental
/// concepts always come out with empty vocals and language.
pub fn merge_suggestions(base: &SongConcept, suggestions: &PartialSongConcept) -> SongConcept {
    let mut merged = base.clone();
    fill_if_empty(&mut merged.genre, &suggestions.genre);
    fill_if_empty(&mut merged.mood, &suggestions.mood);
    fill_if_empty(&mut merged.tempo, &suggestions.tempo);
    fill_if_empty(&mut merged.instrumentation, &suggestions.instrumentation);
    fill_if_empty(&mut merged.vocals, &suggestions.vocals);
    fill_if_empty(&mut merged.language, &suggestions.language);
    merged.enforce_instrumental();
    merged
}

/// Applies an audio reference analysis: the detected instrumental flag
/// wins, the topic suggestion is used only for a blank topic.
pub fn apply_audio_analysis(base: &SongConcept, analysis: &AudioAnalysis) -> SongConcept {
    let mut concept = base.clone();
    if concept.is_blank_topic() && !analysis.topic_suggestion.trim().is_empty() {
        concept.topic = analysis.topic_suggestion.trim().to_string();
    }
    concept.is_instrumental = analysis.is_instrumental;
    merge_suggestions(&concept, &analysis.suggestions)
}

fn fill_if_empty(target: &mut Vec<String>, suggestion: &[String]) {
    if target.is_empty() {
        target.extend(
            suggestion
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
    }
}

//! Song concept data types.

use serde::{Deserialize, Serialize};

/// The creative brief a song is generated from.
///
/// Every mutation helper keeps the instrumental invariant: while
/// `is_instrumental` is set, `vocals` and `language` are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SongConcept {
    /// Free-text song idea. Empty means "pick one for me".
    pub topic: String,
    pub genre: Vec<String>,
    pub mood: Vec<String>,
    pub tempo: Vec<String>,
    pub language: Vec<String>,
    pub is_instrumental: bool,
    pub vocals: Vec<String>,
    pub instrumentation: Vec<String>,
    /// Shown to the user only, never sent to the provider.
    pub excluded_styles: Vec<String>,
}

/// Tag lists of a [`SongConcept`] that can be edited one value at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagField {
    Genre,
    Mood,
    Tempo,
    Language,
    Vocals,
    Instrumentation,
    ExcludedStyles,
}

impl TagField {
    /// Fields that must stay empty for instrumental songs.
    pub fn requires_vocals(self) -> bool {
        matches!(self, TagField::Vocals | TagField::Language)
    }
}

impl SongConcept {
    pub fn with_topic(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Default::default()
        }
    }

    pub fn is_blank_topic(&self) -> bool {
        self.topic.trim().is_empty()
    }

    pub fn tags(&self, field: TagField) -> &[String] {
        match field {
            TagField::Genre => &self.genre,
            TagField::Mood => &self.mood,
            TagField::Tempo => &self.tempo,
            TagField::Language => &self.language,
            TagField::Vocals => &self.vocals,
            TagField::Instrumentation => &self.instrumentation,
            TagField::ExcludedStyles => &self.excluded_styles,
        }
    }

    fn tags_mut(&mut self, field: TagField) -> &mut Vec<String> {
        match field {
            TagField::Genre => &mut self.genre,
            TagField::Mood => &mut self.mood,
            TagField::Tempo => &mut self.tempo,
            TagField::Language => &mut self.language,
            TagField::Vocals => &mut self.vocals,
            TagField::Instrumentation => &mut self.instrumentation,
            TagField::ExcludedStyles => &mut self.excluded_styles,
        }
    }

    /// Switches the instrumental flag. Turning it on clears vocals and
    /// language right away.
    pub fn set_instrumental(&mut self, is_instrumental: bool) {
        self.is_instrumental = is_instrumental;
        self.enforce_instrumental();
    }

    /// Adds `value` if absent, removes it if present.
    ///
    /// Returns whether the concept changed. Vocals and language are locked
    /// while the concept is instrumental.
    pub fn toggle_tag(&mut self, field: TagField, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() || (self.is_instrumental && field.requires_vocals()) {
            return false;
        }
        let tags = self.tags_mut(field);
        match tags.iter().position(|t| t == value) {
            Some(index) => {
                tags.remove(index);
            }
            None => tags.push(value.to_string()),
        }
        true
    }

    /// Appends a custom value unless it is already present.
    pub fn add_tag(&mut self, field: TagField, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() || (self.is_instrumental && field.requires_vocals()) {
            return false;
        }
        let tags = self.tags_mut(field);
        if tags.iter().any(|t| t == value) {
            return false;
        }
        tags.push(value.to_string());
        true
    }

    pub(crate) fn enforce_instrumental(&mut self) {
        if self.is_instrumental {
            self.vocals.clear();
            self.language.clear();
        }
    }
}

/// Attribute suggestions returned by topic analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialSongConcept {
    pub genre: Vec<String>,
    pub mood: Vec<String>,
    pub tempo: Vec<String>,
    pub instrumentation: Vec<String>,
    pub vocals: Vec<String>,
    pub language: Vec<String>,
}

impl PartialSongConcept {
    pub fn is_empty(&self) -> bool {
        self.genre.is_empty()
            && self.mood.is_empty()
            && self.tempo.is_empty()
            && self.instrumentation.is_empty()
            && self.vocals.is_empty()
            && self.language.is_empty()
    }
}

/// What the provider heard in an uploaded audio reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioAnalysis {
    pub suggestions: PartialSongConcept,
    pub is_instrumental: bool,
    /// Short mood description, usable as a topic.
    pub topic_suggestion: String,
}

use crate::concept::SongConcept;
use crate::generation::GeneratedStyle;
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A finished song: concept, chosen lyrics, style and cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongHistoryItem {
    pub id: String,
    /// Creation time in epoch milliseconds.
    pub timestamp: i64,
    pub concept: SongConcept,
    pub lyrics: String,
    #[serde(rename = "styleData")]
    pub style: GeneratedStyle,
    /// Data URL or remote URL of the cover image.
    pub cover_url: String,
}

impl SongHistoryItem {
    /// Creates an item with a fresh id, stamped now.
    pub fn new(
        concept: SongConcept,
        lyrics: String,
        style: GeneratedStyle,
        cover_url: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().timestamp_millis(),
            concept,
            lyrics,
            style,
            cover_url,
        }
    }

    /// Fails unless every artifact is present.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            bail!("History item has no id");
        }
        if self.lyrics.trim().is_empty() {
            bail!("History item {} has no lyrics", self.id);
        }
        if self.style.prompt.trim().is_empty() {
            bail!("History item {} has no style prompt", self.id);
        }
        if self.cover_url.trim().is_empty() {
            bail!("History item {} has no cover", self.id);
        }
        Ok(())
    }

    /// Copy with the concept's instrumental rule applied and the sliders
    /// clamped to their valid range. Imported items may violate both.
    pub fn normalized(&self) -> Self {
        let mut item = self.clone();
        item.concept.enforce_instrumental();
        item.style.clamp_sliders();
        item
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }

    /// Display title: the topic, or a placeholder for untitled songs.
    pub fn title(&self) -> &str {
        let topic = self.concept.topic.trim();
        if topic.is_empty() {
            "Untitled"
        } else {
            topic
        }
    }
}

//! Pipeline state and the working copy it operates on.

use crate::concept::SongConcept;
use crate::generation::{CoverStyle, GeneratedStyle};
use crate::history_store::SongHistoryItem;
use std::fmt;

/// Where the concept-to-song pipeline currently is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    TopicResolving,
    AttributeSuggesting,
    /// Two lyrics variants and the style are being generated.
    DualGenerating,
    /// Waiting for the user to pick a lyrics variant.
    VariantPending,
    CoverGenerating,
    Persisting,
    Done {
        item_id: String,
    },
    Failed {
        error: String,
        recoverable: bool,
    },
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done { .. } | PipelineState::Failed { .. })
    }

    /// True while the pipeline cannot move on without user input.
    pub fn is_blocked(&self) -> bool {
        matches!(self, PipelineState::VariantPending)
    }

    /// True while a request is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            PipelineState::TopicResolving
                | PipelineState::AttributeSuggesting
                | PipelineState::DualGenerating
                | PipelineState::CoverGenerating
                | PipelineState::Persisting
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "idle"),
            PipelineState::TopicResolving => write!(f, "resolving topic"),
            PipelineState::AttributeSuggesting => write!(f, "suggesting attributes"),
            PipelineState::DualGenerating => write!(f, "generating lyrics and style"),
            PipelineState::VariantPending => write!(f, "waiting for variant choice"),
            PipelineState::CoverGenerating => write!(f, "generating cover"),
            PipelineState::Persisting => write!(f, "saving"),
            PipelineState::Done { item_id } => write!(f, "done ({})", item_id),
            PipelineState::Failed { error, .. } => write!(f, "failed: {}", error),
        }
    }
}

/// The song being worked on. Only [`super::SongPipeline`] writes it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkingCopy {
    pub concept: SongConcept,
    /// Lyrics candidates awaiting a choice.
    pub variants: Option<[String; 2]>,
    pub lyrics: Option<String>,
    pub style: Option<GeneratedStyle>,
    pub cover_url: Option<String>,
    pub cover_style: CoverStyle,
    /// Set once the song is in the history.
    pub item_id: Option<String>,
    pub(crate) timestamp: Option<i64>,
    /// The last save failed and the working copy is newer than the store.
    pub(crate) save_pending: bool,
}

impl WorkingCopy {
    pub fn from_concept(concept: SongConcept) -> Self {
        Self {
            concept,
            ..Default::default()
        }
    }

    pub fn from_item(item: &SongHistoryItem) -> Self {
        Self {
            concept: item.concept.clone(),
            variants: None,
            lyrics: Some(item.lyrics.clone()),
            style: Some(item.style.clone()),
            cover_url: Some(item.cover_url.clone()),
            cover_style: CoverStyle::Default,
            item_id: Some(item.id.clone()),
            timestamp: Some(item.timestamp),
            save_pending: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::Locale;

    #[test]
    fn test_state_classification() {
        assert!(!PipelineState::Idle.is_terminal());
        assert!(PipelineState::VariantPending.is_blocked());
        assert!(!PipelineState::VariantPending.is_busy());
        assert!(PipelineState::DualGenerating.is_busy());
        assert!(PipelineState::Done {
            item_id: "x".to_string()
        }
        .is_terminal());
        let failed = PipelineState::Failed {
            error: "boom".to_string(),
            recoverable: true,
        };
        assert!(failed.is_terminal());
        assert!(!failed.is_blocked());
        assert_eq!(failed.to_string(), "failed: boom");
    }

    #[test]
    fn test_working_copy_from_item() {
        let concept = SongConcept::with_topic("Leuchtturm");
        let item = SongHistoryItem::new(
            concept.clone(),
            "[Verse]\nLicht".to_string(),
            GeneratedStyle::fallback(&concept, Locale::De),
            "data:image/png;base64,AA".to_string(),
        );
        let working = WorkingCopy::from_item(&item);
        assert_eq!(working.item_id.as_deref(), Some(item.id.as_str()));
        assert_eq!(working.timestamp, Some(item.timestamp));
        assert_eq!(working.lyrics.as_deref(), Some("[Verse]\nLicht"));
        assert!(working.variants.is_none());
    }
}

//! Pipeline executor.

use super::state::{PipelineState, WorkingCopy};
use crate::concept::{merge_suggestions, SongConcept};
use crate::generation::normalize::regie_context;
use crate::generation::{
    CoverStyle, GeneratedStyle, GenerationClient, GenerationError, ParsedExt, PromptLength,
};
use crate::history_store::{HistoryStore, SongHistoryItem};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors that can occur while running the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("No topic available, enter one or try again")]
    EmptyTopic,

    #[error("No lyrics variants are waiting for a choice")]
    NoPendingSelection,

    #[error("Variant {0} does not exist, choose 0 or 1")]
    InvalidVariant(usize),

    #[error("The working copy has no {0}")]
    NothingToRegenerate(&'static str),

    #[error("No history item with id {0}")]
    UnknownItem(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Persistence error: {0:#}")]
    Persistence(anyhow::Error),
}

impl PipelineError {
    /// True when the user has to supply a new API key before retrying.
    pub fn needs_credential(&self) -> bool {
        matches!(self, PipelineError::Generation(e) if e.is_invalid_credential())
    }

    fn is_recoverable(&self) -> bool {
        !self.needs_credential()
    }
}

/// Runs `operation` unless `cancel` fires first.
async fn cancellable<T, F>(cancel: &CancellationToken, operation: F) -> Result<T, PipelineError>
where
    F: Future<Output = Result<T, GenerationError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PipelineError::Cancelled),
        result = operation => result.map_err(PipelineError::from),
    }
}

struct Candidates {
    concept: SongConcept,
    variants: [String; 2],
    style: GeneratedStyle,
}

/// Drives a song from concept to persisted history item.
///
/// Owns the working copy and the in-memory history list. A cancelled
/// operation leaves both as they were before the call.
pub struct SongPipeline {
    client: GenerationClient,
    store: Arc<dyn HistoryStore>,
    state: PipelineState,
    working: WorkingCopy,
    history: Vec<SongHistoryItem>,
}

impl SongPipeline {
    pub fn new(client: GenerationClient, store: Arc<dyn HistoryStore>) -> Self {
        Self {
            client,
            store,
            state: PipelineState::Idle,
            working: WorkingCopy::default(),
            history: Vec::new(),
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn working(&self) -> &WorkingCopy {
        &self.working
    }

    pub fn client(&self) -> &GenerationClient {
        &self.client
    }

    /// Drops the working copy and returns to [`PipelineState::Idle`].
    pub fn reset(&mut self) {
        self.working = WorkingCopy::default();
        self.state = PipelineState::Idle;
    }

    fn snapshot(&self) -> (PipelineState, WorkingCopy) {
        (self.state.clone(), self.working.clone())
    }

    fn restore(&mut self, snapshot: (PipelineState, WorkingCopy)) {
        info!("Pipeline operation cancelled");
        (self.state, self.working) = snapshot;
    }

    fn fail(&mut self, error: &PipelineError) {
        let recoverable = error.is_recoverable();
        warn!(error = %error, recoverable, "Pipeline step failed");
        self.state = PipelineState::Failed {
            error: error.to_string(),
            recoverable,
        };
    }

    // =========================================================================
    // Main flow
    // =========================================================================

    /// Resolves the topic, suggests attributes and generates two lyrics
    /// variants plus the style.
    ///
    /// On failure nothing generated is kept: the working copy holds only the
    /// submitted concept.
    pub async fn submit_concept(
        &mut self,
        mut concept: SongConcept,
        cancel: &CancellationToken,
    ) -> Result<&[String; 2], PipelineError> {
        concept.enforce_instrumental();
        let snapshot = self.snapshot();
        match self.generate_candidates(concept.clone(), cancel).await {
            Ok(candidates) => {
                info!(topic = %candidates.concept.topic, "Lyrics variants ready");
                self.working = WorkingCopy {
                    concept: candidates.concept,
                    style: Some(candidates.style),
                    ..Default::default()
                };
                self.state = PipelineState::VariantPending;
                Ok(&*self.working.variants.insert(candidates.variants))
            }
            Err(PipelineError::Cancelled) => {
                self.restore(snapshot);
                Err(PipelineError::Cancelled)
            }
            Err(e) => {
                self.working = WorkingCopy::from_concept(concept);
                self.fail(&e);
                Err(e)
            }
        }
    }

    async fn generate_candidates(
        &mut self,
        mut concept: SongConcept,
        cancel: &CancellationToken,
    ) -> Result<Candidates, PipelineError> {
        self.state = PipelineState::TopicResolving;
        if concept.is_blank_topic() {
            let topic = cancellable(cancel, self.client.suggest_random_topic(None)).await?;
            if topic.trim().is_empty() {
                return Err(PipelineError::EmptyTopic);
            }
            info!(topic = %topic, "Resolved random topic");
            concept.topic = topic;
        }

        self.state = PipelineState::AttributeSuggesting;
        let suggestions = cancellable(
            cancel,
            self.client
                .analyze_topic(&concept.topic, concept.is_instrumental),
        )
        .await?
        .or_fallback();
        let concept = merge_suggestions(&concept, &suggestions);

        self.state = PipelineState::DualGenerating;
        let locale = self.client.settings().locale;
        let client = &self.client;
        let (first, second, style) = cancellable(cancel, async {
            tokio::try_join!(
                client.generate_lyrics(&concept),
                client.generate_lyrics(&concept),
                client.generate_style_prompt(&concept, locale, None),
            )
        })
        .await?;

        Ok(Candidates {
            variants: [first, second],
            style: style.or_fallback(),
            concept,
        })
    }

    /// Takes variant `index` as the song's lyrics, generates the cover and
    /// saves the song.
    ///
    /// A cover failure keeps the chosen lyrics and style, see
    /// [`SongPipeline::retry_cover`].
    pub async fn choose_variant(
        &mut self,
        index: usize,
        cancel: &CancellationToken,
    ) -> Result<SongHistoryItem, PipelineError> {
        let variants = self
            .working
            .variants
            .as_ref()
            .ok_or(PipelineError::NoPendingSelection)?;
        let lyrics = variants
            .get(index)
            .cloned()
            .ok_or(PipelineError::InvalidVariant(index))?;

        let snapshot = self.snapshot();
        info!(variant = index, "Lyrics variant chosen");
        self.working.lyrics = Some(lyrics);
        self.working.variants = None;

        let result = self.complete_with_cover(cancel).await;
        self.settle(snapshot, result)
    }

    /// Retries whatever failed after the variant choice: the cover, or only
    /// saving when the cover already exists.
    pub async fn retry_cover(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<SongHistoryItem, PipelineError> {
        self.require_song()?;
        let snapshot = self.snapshot();
        let result = if self.working.cover_url.is_some() && self.working.save_pending {
            self.persist_working_copy()
        } else {
            self.complete_with_cover(cancel).await
        };
        self.settle(snapshot, result)
    }

    fn settle(
        &mut self,
        snapshot: (PipelineState, WorkingCopy),
        result: Result<SongHistoryItem, PipelineError>,
    ) -> Result<SongHistoryItem, PipelineError> {
        match result {
            Err(PipelineError::Cancelled) => {
                self.restore(snapshot);
                Err(PipelineError::Cancelled)
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
            ok => ok,
        }
    }

    fn require_song(&self) -> Result<(), PipelineError> {
        if self.working.lyrics.is_none() {
            return Err(PipelineError::NothingToRegenerate("lyrics"));
        }
        if self.working.style.is_none() {
            return Err(PipelineError::NothingToRegenerate("style"));
        }
        Ok(())
    }

    async fn complete_with_cover(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<SongHistoryItem, PipelineError> {
        self.state = PipelineState::CoverGenerating;
        let cover_url = cancellable(
            cancel,
            self.client
                .generate_cover_art(&self.working.concept, &self.working.cover_style),
        )
        .await?;
        self.working.cover_url = Some(cover_url);
        self.persist_working_copy()
    }

    fn working_item(&self) -> Result<SongHistoryItem, PipelineError> {
        let working = &self.working;
        let (Some(lyrics), Some(style), Some(cover_url)) =
            (&working.lyrics, &working.style, &working.cover_url)
        else {
            return Err(PipelineError::NothingToRegenerate("finished song"));
        };
        let mut item = SongHistoryItem::new(
            working.concept.clone(),
            lyrics.clone(),
            style.clone(),
            cover_url.clone(),
        );
        if let Some(id) = &working.item_id {
            item.id = id.clone();
        }
        if let Some(timestamp) = working.timestamp {
            item.timestamp = timestamp;
        }
        Ok(item)
    }

    fn persist_working_copy(&mut self) -> Result<SongHistoryItem, PipelineError> {
        self.state = PipelineState::Persisting;
        let item = self.working_item()?;
        self.working.save_pending = true;
        self.store.put(&item).map_err(PipelineError::Persistence)?;

        self.working.save_pending = false;
        self.working.item_id = Some(item.id.clone());
        self.working.timestamp = Some(item.timestamp);
        self.remember(item.clone());
        info!(id = %item.id, title = %item.title(), "Song saved");
        self.state = PipelineState::Done {
            item_id: item.id.clone(),
        };
        Ok(item)
    }

    fn remember(&mut self, item: SongHistoryItem) {
        match self.history.iter().position(|i| i.id == item.id) {
            Some(index) => self.history[index] = item,
            None => self.history.insert(0, item),
        }
    }

    // =========================================================================
    // Regeneration of single artifacts
    // =========================================================================

    /// Replaces the topic with a fresh idea. `None` means any theme.
    pub async fn regenerate_topic(
        &mut self,
        category: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<&str, PipelineError> {
        let topic = cancellable(cancel, self.client.suggest_random_topic(category)).await?;
        if topic.trim().is_empty() {
            return Err(PipelineError::EmptyTopic);
        }
        self.working.concept.topic = topic;
        Ok(&self.working.concept.topic)
    }

    /// Fills empty attributes from a topic analysis. Attributes the user
    /// already set stay as they are.
    pub async fn inspire(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<&SongConcept, PipelineError> {
        let concept = &self.working.concept;
        if concept.is_blank_topic() {
            return Err(PipelineError::EmptyTopic);
        }
        let suggestions = cancellable(
            cancel,
            self.client
                .analyze_topic(&concept.topic, concept.is_instrumental),
        )
        .await?
        .or_fallback();
        self.working.concept = merge_suggestions(&self.working.concept, &suggestions);
        Ok(&self.working.concept)
    }

    /// Streams new lyrics for the current concept.
    ///
    /// Every raw delta goes to `on_delta` while the model writes. The
    /// working copy only takes the cleaned text once the stream is done, so
    /// a failed or cancelled stream leaves the old lyrics in place.
    pub async fn regenerate_lyrics<F>(
        &mut self,
        cancel: &CancellationToken,
        on_delta: F,
    ) -> Result<&str, PipelineError>
    where
        F: FnMut(&str),
    {
        if self.working.lyrics.is_none() {
            return Err(PipelineError::NothingToRegenerate("lyrics"));
        }
        let client = &self.client;
        let concept = &self.working.concept;
        let lyrics = cancellable(cancel, async {
            client.stream_lyrics(concept).await?.collect_with(on_delta).await
        })
        .await?;
        debug!(chars = lyrics.chars().count(), "Lyrics regenerated");
        Ok(self.working.lyrics.insert(lyrics).as_str())
    }

    /// Extra style tags for the current concept, meant to be dropped into
    /// the lyrics as bracketed directions. A failed request yields no tags.
    pub async fn suggest_style_tags(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, PipelineError> {
        if self.working.concept.is_blank_topic() {
            return Err(PipelineError::EmptyTopic);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            tags = self.client.suggest_style_tags(&self.working.concept) => Ok(tags),
        }
    }

    /// Generates a new style, steered by the directions in the current
    /// lyrics.
    pub async fn regenerate_style(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<&GeneratedStyle, PipelineError> {
        if self.working.style.is_none() {
            return Err(PipelineError::NothingToRegenerate("style"));
        }
        let settings = self.client.settings();
        let regie = self
            .working
            .lyrics
            .as_deref()
            .and_then(|lyrics| regie_context(lyrics, settings.limits.regie_context_max_chars));
        let style = cancellable(
            cancel,
            self.client
                .generate_style_prompt(&self.working.concept, settings.locale, regie.as_deref()),
        )
        .await?
        .or_fallback();
        Ok(&*self.working.style.insert(style))
    }

    /// Generates a new cover in `style` and saves the song with it.
    pub async fn regenerate_cover(
        &mut self,
        style: &CoverStyle,
        cancel: &CancellationToken,
    ) -> Result<SongHistoryItem, PipelineError> {
        self.require_song()?;
        let snapshot = self.snapshot();
        self.working.cover_style = style.clone();
        let result = self.complete_with_cover(cancel).await;
        self.settle(snapshot, result)
    }

    // =========================================================================
    // Working copy edits
    // =========================================================================

    /// Replaces the concept, keeping the instrumental invariant.
    pub fn set_concept(&mut self, mut concept: SongConcept) {
        concept.enforce_instrumental();
        self.working.concept = concept;
    }

    /// Art direction for the next cover generated by
    /// [`SongPipeline::choose_variant`] or [`SongPipeline::retry_cover`].
    pub fn set_cover_style(&mut self, style: CoverStyle) {
        self.working.cover_style = style;
    }

    pub fn set_instrumental(&mut self, is_instrumental: bool) {
        self.working.concept.set_instrumental(is_instrumental);
    }

    pub fn update_lyrics(&mut self, lyrics: &str) -> Result<(), PipelineError> {
        let current = self
            .working
            .lyrics
            .as_mut()
            .ok_or(PipelineError::NothingToRegenerate("lyrics"))?;
        *current = lyrics.trim().to_string();
        Ok(())
    }

    /// Replaces the style prompt and reports its length against the limits.
    pub fn update_style_prompt(&mut self, prompt: &str) -> Result<PromptLength, PipelineError> {
        let limits = &self.client.settings().limits;
        let style = self
            .working
            .style
            .as_mut()
            .ok_or(PipelineError::NothingToRegenerate("style"))?;
        style.set_prompt(prompt, limits);
        Ok(style.prompt_length(limits))
    }

    /// Replaces the song description.
    pub fn update_story(&mut self, story: &str) -> Result<(), PipelineError> {
        let style = self
            .working
            .style
            .as_mut()
            .ok_or(PipelineError::NothingToRegenerate("style"))?;
        style.song_description = story.trim().to_string();
        Ok(())
    }

    /// Writes the edited working copy back under its history id.
    pub fn save_edits(&mut self) -> Result<SongHistoryItem, PipelineError> {
        if self.working.item_id.is_none() {
            return Err(PipelineError::NothingToRegenerate("saved song"));
        }
        self.persist_working_copy().inspect_err(|e| self.fail(e))
    }

    // =========================================================================
    // History
    // =========================================================================

    pub fn load_history(&mut self) -> Result<&[SongHistoryItem], PipelineError> {
        self.history = self.store.list().map_err(PipelineError::Persistence)?;
        debug!(items = self.history.len(), "History loaded");
        Ok(&self.history)
    }

    pub fn history(&self) -> &[SongHistoryItem] {
        &self.history
    }

    /// Makes a saved song the working copy.
    pub fn recall(&mut self, id: &str) -> Result<&WorkingCopy, PipelineError> {
        let item = match self.history.iter().find(|i| i.id == id) {
            Some(item) => item.clone(),
            None => self
                .store
                .get(id)
                .map_err(PipelineError::Persistence)?
                .ok_or_else(|| PipelineError::UnknownItem(id.to_string()))?,
        };
        self.working = WorkingCopy::from_item(&item);
        self.state = PipelineState::Done { item_id: item.id };
        Ok(&self.working)
    }

    /// Removes a saved song. Unknown ids are not an error.
    pub fn delete(&mut self, id: &str) -> Result<bool, PipelineError> {
        let removed = self.store.delete(id).map_err(PipelineError::Persistence)?;
        self.history.retain(|i| i.id != id);
        if self.working.item_id.as_deref() == Some(id) {
            self.working.item_id = None;
            self.working.timestamp = None;
        }
        Ok(removed)
    }
}

//! Song-level generation operations on top of a [`GenerationProvider`].

use super::normalize::{clean_text, strip_lyrics_preamble, strip_quotes};
use super::parse::{
    parse_audio_analysis, parse_style, parse_style_tags, parse_topic_analysis, with_fallback,
    Parsed, RawStyle,
};
use super::prompts;
use super::provider::{GenerationProvider, ProviderError, TextStream};
use super::style::GeneratedStyle;
use super::types::{GenerationLimits, ImageConfig, ImageRequest, InlineImage, Locale, TextRequest};
use crate::concept::{AudioAnalysis, PartialSongConcept, SongConcept};
use base64::Engine;
use futures::{Stream, StreamExt};
use rand::distr::Alphanumeric;
use rand::Rng;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Category that asks for a topic without any theme restriction.
pub const RANDOM_CATEGORY: &str = "Zufall";
const DEFAULT_AUDIO_MIME: &str = "audio/mpeg";
const STYLE_TAG_COUNT: usize = 5;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Cover art could not be generated: {0}")]
    ArtGeneration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl GenerationError {
    /// True when the user has to supply a new credential.
    pub fn is_invalid_credential(&self) -> bool {
        match self {
            GenerationError::Configuration(_) => true,
            GenerationError::Provider(e) => e.is_invalid_credential(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub locale: Locale,
    /// Lyrics language when the concept names none.
    pub lyrics_language: String,
    pub limits: GenerationLimits,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            locale: Locale::default(),
            lyrics_language: "German".to_string(),
            limits: GenerationLimits::default(),
        }
    }
}

/// Art direction for cover generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CoverStyle {
    #[default]
    Default,
    /// Short preset name such as "Watercolor".
    Preset(String),
    /// Full user-written style instruction.
    Custom(String),
}

impl CoverStyle {
    /// Inputs longer than 30 characters or containing a period are taken
    /// as a custom instruction, anything else as a preset name.
    pub fn from_input(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty() || input == "Default" {
            CoverStyle::Default
        } else if input.chars().count() > 30 || input.contains('.') {
            CoverStyle::Custom(input.to_string())
        } else {
            CoverStyle::Preset(input.to_string())
        }
    }

    pub fn instruction(&self) -> String {
        match self {
            CoverStyle::Default => "professional photography or digital painting".to_string(),
            CoverStyle::Preset(name) => format!("{} style", name),
            CoverStyle::Custom(text) => text.clone(),
        }
    }
}

/// Streamed lyrics.
///
/// Yields raw text deltas as the model produces them and keeps the
/// accumulated text. Cleanup runs once, in [`LyricsStream::finish`].
pub struct LyricsStream {
    inner: TextStream,
    accumulated: String,
    done: bool,
}

impl LyricsStream {
    pub fn new(inner: TextStream) -> Self {
        Self {
            inner,
            accumulated: String::new(),
            done: false,
        }
    }

    /// Raw text received so far.
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// Cleaned lyrics from everything received.
    pub fn finish(self) -> String {
        strip_lyrics_preamble(&clean_text(&self.accumulated))
    }

    /// Drains the stream and returns the cleaned lyrics.
    pub async fn into_lyrics(self) -> Result<String, GenerationError> {
        self.collect_with(|_| {}).await
    }

    /// Like [`LyricsStream::into_lyrics`], handing every raw delta to
    /// `on_delta` as it arrives.
    pub async fn collect_with<F>(mut self, mut on_delta: F) -> Result<String, GenerationError>
    where
        F: FnMut(&str),
    {
        while let Some(delta) = self.next().await {
            on_delta(&delta?);
        }
        let lyrics = self.finish();
        if lyrics.is_empty() {
            return Err(ProviderError::InvalidResponse("no lyrics in response".to_string()).into());
        }
        Ok(lyrics)
    }
}

impl Stream for LyricsStream {
    type Item = Result<String, ProviderError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match this.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(delta))) => {
                this.accumulated.push_str(&delta);
                Poll::Ready(Some(Ok(delta)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.done = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Builds prompts, calls the provider and turns answers into song artifacts.
#[derive(Clone)]
pub struct GenerationClient {
    provider: Arc<dyn GenerationProvider>,
    settings: ClientSettings,
}

fn random_seed() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect()
}

impl GenerationClient {
    pub fn new(provider: Arc<dyn GenerationProvider>, settings: ClientSettings) -> Self {
        Self { provider, settings }
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn limits(&self) -> &GenerationLimits {
        &self.settings.limits
    }

    fn fallback_topic(&self) -> &'static str {
        match self.settings.locale {
            Locale::De => "Ein sonniger Tag am geheimen See.",
            Locale::En => "A sunny day at the hidden lake.",
        }
    }

    /// Asks for a fresh song idea. `None` or [`RANDOM_CATEGORY`] means any theme.
    pub async fn suggest_random_topic(
        &self,
        category: Option<&str>,
    ) -> Result<String, GenerationError> {
        let category = category.filter(|c| !c.trim().eq_ignore_ascii_case(RANDOM_CATEGORY));
        let (prompt, instruction) =
            prompts::random_topic(category, self.settings.locale, &random_seed());
        let request = TextRequest::new(prompt)
            .with_system_instruction(instruction)
            .with_temperature(1.0);

        debug!(provider = %self.provider.name(), ?category, "Requesting random topic");
        let raw = self.provider.generate_text(&request).await?;
        let topic = clean_text(&strip_quotes(&raw)).trim().to_string();
        if topic.is_empty() {
            warn!("Random topic came back empty, using fallback topic");
            return Ok(self.fallback_topic().to_string());
        }
        Ok(topic)
    }

    /// Suggests attributes for a topic. A malformed answer falls back to
    /// empty suggestions.
    pub async fn analyze_topic(
        &self,
        topic: &str,
        is_instrumental: bool,
    ) -> Result<Parsed<PartialSongConcept>, GenerationError> {
        if topic.trim().is_empty() {
            return Err(GenerationError::InvalidInput(
                "cannot analyze an empty topic".to_string(),
            ));
        }
        let request = TextRequest::new(prompts::topic_analysis(topic, is_instrumental))
            .with_system_instruction(prompts::SYSTEM_INSTRUCTION)
            .with_json_schema(prompts::topic_analysis_schema());

        debug!(topic = %topic, is_instrumental, "Analyzing topic");
        let raw = self.provider.generate_text(&request).await?;
        let parsed = parse_topic_analysis(&raw).map(|mut suggestions| {
            if is_instrumental {
                suggestions.vocals.clear();
                suggestions.language.clear();
            }
            suggestions
        });
        Ok(with_fallback(parsed, PartialSongConcept::default))
    }

    /// Derives concept attributes from an audio reference.
    pub async fn analyze_audio(
        &self,
        audio: &[u8],
        mime_type: &str,
    ) -> Result<Parsed<AudioAnalysis>, GenerationError> {
        if audio.is_empty() {
            return Err(GenerationError::InvalidInput("audio file is empty".to_string()));
        }
        let max_bytes = self.settings.limits.max_audio_bytes;
        if audio.len() > max_bytes {
            return Err(GenerationError::InvalidInput(format!(
                "audio file is {:.1} MB, the limit is {:.1} MB",
                audio.len() as f64 / (1024.0 * 1024.0),
                max_bytes as f64 / (1024.0 * 1024.0)
            )));
        }
        let mime_type = if mime_type.trim().is_empty() {
            DEFAULT_AUDIO_MIME
        } else {
            mime_type.trim()
        };
        let encoded = base64::engine::general_purpose::STANDARD.encode(audio);
        let request = TextRequest::new(prompts::audio_analysis(self.settings.locale))
            .with_inline_data(mime_type, encoded)
            .with_system_instruction(prompts::SYSTEM_INSTRUCTION)
            .with_json_schema(prompts::audio_analysis_schema());

        info!(bytes = audio.len(), mime_type = %mime_type, "Analyzing audio reference");
        let raw = self.provider.generate_text(&request).await?;
        Ok(with_fallback(parse_audio_analysis(&raw), AudioAnalysis::default))
    }

    /// Starts streaming lyrics for `concept`.
    pub async fn stream_lyrics(&self, concept: &SongConcept) -> Result<LyricsStream, GenerationError> {
        let prompt = prompts::lyrics(concept, &self.settings.lyrics_language, &random_seed());
        let request = TextRequest::new(prompt)
            .with_system_instruction(prompts::SYSTEM_INSTRUCTION)
            .with_temperature(1.0);

        debug!(
            model = %self.provider.text_model(),
            is_instrumental = concept.is_instrumental,
            "Streaming lyrics"
        );
        let stream = self.provider.stream_text(&request).await?;
        Ok(LyricsStream::new(stream))
    }

    /// Generates one lyrics variant.
    pub async fn generate_lyrics(&self, concept: &SongConcept) -> Result<String, GenerationError> {
        self.stream_lyrics(concept).await?.into_lyrics().await
    }

    /// Generates the style prompt and slider values. `regie_context` carries
    /// the bracketed directions of the current lyrics, if any.
    pub async fn generate_style_prompt(
        &self,
        concept: &SongConcept,
        locale: Locale,
        regie_context: Option<&str>,
    ) -> Result<Parsed<GeneratedStyle>, GenerationError> {
        let limits = &self.settings.limits;
        let prompt = prompts::style(concept, locale, limits.style_prompt_target, regie_context);
        let request = TextRequest::new(prompt)
            .with_system_instruction(prompts::SYSTEM_INSTRUCTION)
            .with_temperature(0.8)
            .with_json_schema(prompts::style_schema());

        debug!(has_regie_context = regie_context.is_some(), "Generating style prompt");
        let raw = self.provider.generate_text(&request).await?;
        let parsed = parse_style(&raw)
            .map(|raw_style| GeneratedStyle::from_raw(raw_style, concept, locale, limits));
        Ok(with_fallback(parsed, || {
            GeneratedStyle::from_raw(RawStyle::default(), concept, locale, limits)
        }))
    }

    /// A handful of extra style tags. Never fails: any problem yields an
    /// empty list.
    pub async fn suggest_style_tags(&self, concept: &SongConcept) -> Vec<String> {
        let request = TextRequest::new(prompts::style_tags(concept, STYLE_TAG_COUNT))
            .with_system_instruction(prompts::SYSTEM_INSTRUCTION)
            .with_json_schema(prompts::style_tags_schema());

        let raw = match self.provider.generate_text(&request).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Style tag request failed");
                return Vec::new();
            }
        };
        match parse_style_tags(&raw) {
            Ok(tags) => tags.into_iter().take(STYLE_TAG_COUNT).collect(),
            Err(e) => {
                warn!(error = %e, "Ignoring style tag response");
                Vec::new()
            }
        }
    }

    /// Generates cover art and returns it as a data URL.
    ///
    /// A failed request is retried once without image config. When the
    /// answer holds no image a simpler abstract prompt is tried. A rejected
    /// credential is reported as a provider error, everything else as
    /// [`GenerationError::ArtGeneration`].
    pub async fn generate_cover_art(
        &self,
        concept: &SongConcept,
        style: &CoverStyle,
    ) -> Result<String, GenerationError> {
        info!(model = %self.provider.image_model(), ?style, "Generating cover art");
        match self.attempt_cover(concept, style).await {
            Ok(Some(image)) => Ok(image.to_data_url()),
            Ok(None) => Err(GenerationError::ArtGeneration(
                "the provider returned no image, try a more neutral topic".to_string(),
            )),
            Err(e) if e.is_invalid_credential() => Err(GenerationError::Provider(e)),
            Err(e) => Err(GenerationError::ArtGeneration(e.to_string())),
        }
    }

    async fn attempt_cover(
        &self,
        concept: &SongConcept,
        style: &CoverStyle,
    ) -> Result<Option<InlineImage>, ProviderError> {
        let primary = prompts::cover(concept, style);
        let image = match self
            .request_image(primary.clone(), Some(ImageConfig::default()))
            .await
        {
            Ok(image) => image,
            Err(e) if e.is_invalid_credential() => return Err(e),
            Err(e) => {
                warn!(error = %e, "Cover request failed, retrying without image config");
                self.request_image(primary, None).await?
            }
        };
        if image.is_some() {
            return Ok(image);
        }
        warn!("Cover response held no image, trying fallback prompt");
        self.request_image(prompts::cover_fallback(concept, style), None)
            .await
    }

    async fn request_image(
        &self,
        prompt: String,
        image_config: Option<ImageConfig>,
    ) -> Result<Option<InlineImage>, ProviderError> {
        self.provider
            .generate_image(&ImageRequest {
                prompt,
                image_config,
            })
            .await
    }
}

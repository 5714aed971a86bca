//! Scripted generation provider
//!
//! Answers each request kind from its own queue, so concurrent lyrics and
//! style requests can't steal each other's answers. An empty queue falls
//! back to a canned answer from [`super::constants`].

use super::constants::*;
use async_trait::async_trait;
use futures::StreamExt;
use songsmith::generation::prompts::{
    audio_analysis_schema, style_schema, style_tags_schema, topic_analysis_schema,
};
use songsmith::generation::{
    GenerationProvider, ImageRequest, InlineImage, ProviderError, TextRequest, TextStream,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

type Answers<T> = Mutex<VecDeque<Result<T, ProviderError>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Topic,
    TopicAnalysis,
    AudioAnalysis,
    Style,
    StyleTags,
}

#[derive(Default)]
pub struct FakeProvider {
    topics: Answers<String>,
    topic_analyses: Answers<String>,
    audio_analyses: Answers<String>,
    styles: Answers<String>,
    lyrics: Answers<Vec<String>>,
    images: Answers<Option<InlineImage>>,
    stall_images: AtomicBool,
    lyrics_calls: AtomicUsize,
    text_requests: Mutex<Vec<(TextKind, TextRequest)>>,
    image_requests: Mutex<Vec<ImageRequest>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_topic(self, answer: Result<&str, ProviderError>) -> Self {
        push(&self.topics, answer.map(str::to_string));
        self
    }

    pub fn with_topic_analysis(self, answer: Result<&str, ProviderError>) -> Self {
        push(&self.topic_analyses, answer.map(str::to_string));
        self
    }

    pub fn with_audio_analysis(self, answer: Result<&str, ProviderError>) -> Self {
        push(&self.audio_analyses, answer.map(str::to_string));
        self
    }

    pub fn with_style(self, answer: Result<&str, ProviderError>) -> Self {
        push(&self.styles, answer.map(str::to_string));
        self
    }

    /// Queues one streamed lyrics answer, delivered in `chunks`.
    pub fn with_lyrics(self, chunks: &[&str]) -> Self {
        push(
            &self.lyrics,
            Ok(chunks.iter().map(|c| c.to_string()).collect()),
        );
        self
    }

    pub fn with_lyrics_error(self, error: ProviderError) -> Self {
        push(&self.lyrics, Err(error));
        self
    }

    pub fn with_image(self, answer: Result<Option<InlineImage>, ProviderError>) -> Self {
        push(&self.images, answer);
        self
    }

    /// Image requests never complete until this is switched off.
    pub fn stall_images(&self, stall: bool) {
        self.stall_images.store(stall, Ordering::SeqCst);
    }

    pub fn lyrics_calls(&self) -> usize {
        self.lyrics_calls.load(Ordering::SeqCst)
    }

    pub fn text_requests(&self, kind: TextKind) -> Vec<TextRequest> {
        self.text_requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub fn image_requests(&self) -> Vec<ImageRequest> {
        self.image_requests.lock().unwrap().clone()
    }

    fn classify(request: &TextRequest) -> TextKind {
        match &request.response_schema {
            None => TextKind::Topic,
            Some(schema) if *schema == topic_analysis_schema() => TextKind::TopicAnalysis,
            Some(schema) if *schema == audio_analysis_schema() => TextKind::AudioAnalysis,
            Some(schema) if *schema == style_schema() => TextKind::Style,
            Some(schema) if *schema == style_tags_schema() => TextKind::StyleTags,
            Some(schema) => panic!("unexpected response schema {}", schema),
        }
    }
}

fn push<T>(queue: &Answers<T>, answer: Result<T, ProviderError>) {
    queue.lock().unwrap().push_back(answer);
}

fn pop_or<T>(queue: &Answers<T>, default: impl FnOnce() -> T) -> Result<T, ProviderError> {
    queue
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Ok(default()))
}

pub fn png() -> InlineImage {
    InlineImage {
        mime_type: COVER_MIME.to_string(),
        data: COVER_DATA.to_string(),
    }
}

/// Lyrics that differ per call, so both variants are distinguishable.
pub fn numbered_lyrics(call: usize) -> Vec<String> {
    vec![
        "[Verse 1]\n".to_string(),
        format!("Das Licht dreht sich zum {}. Mal\n", call),
        "[Chorus]\nKomm nach Haus".to_string(),
    ]
}

#[async_trait]
impl GenerationProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn text_model(&self) -> &str {
        "fake-text"
    }

    fn image_model(&self) -> &str {
        "fake-image"
    }

    async fn generate_text(&self, request: &TextRequest) -> Result<String, ProviderError> {
        let kind = Self::classify(request);
        self.text_requests
            .lock()
            .unwrap()
            .push((kind, request.clone()));
        match kind {
            TextKind::Topic => pop_or(&self.topics, || RANDOM_TOPIC.to_string()),
            TextKind::TopicAnalysis => {
                pop_or(&self.topic_analyses, || TOPIC_ANALYSIS_JSON.to_string())
            }
            TextKind::AudioAnalysis => {
                pop_or(&self.audio_analyses, || AUDIO_ANALYSIS_JSON.to_string())
            }
            TextKind::Style => pop_or(&self.styles, || STYLE_JSON.to_string()),
            TextKind::StyleTags => Ok(STYLE_TAGS_JSON.to_string()),
        }
    }

    async fn stream_text(&self, _request: &TextRequest) -> Result<TextStream, ProviderError> {
        let call = self.lyrics_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let chunks = pop_or(&self.lyrics, || numbered_lyrics(call))?;
        Ok(futures::stream::iter(chunks.into_iter().map(Ok)).boxed())
    }

    async fn generate_image(
        &self,
        request: &ImageRequest,
    ) -> Result<Option<InlineImage>, ProviderError> {
        self.image_requests.lock().unwrap().push(request.clone());
        if self.stall_images.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        pop_or(&self.images, || Some(png()))
    }
}

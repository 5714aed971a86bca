//! Google Gemini provider implementation.
//!
//! Talks to the `generateContent` REST API. Streaming uses
//! `streamGenerateContent` with server-sent events.

use super::client::GenerationError;
use super::provider::{GenerationProvider, ProviderError, TextStream};
use super::types::{ImageRequest, InlineImage, Part, TextRequest};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// A Gemini API key. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub const MIN_LEN: usize = 20;

    pub fn new(key: &str) -> Result<Self, GenerationError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(GenerationError::Configuration(
                "no API key configured".to_string(),
            ));
        }
        if key.len() < Self::MIN_LEN {
            return Err(GenerationError::Configuration(format!(
                "API key looks invalid, expected at least {} characters",
                Self::MIN_LEN
            )));
        }
        Ok(Self(key.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(****)")
    }
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: ApiKey,
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
    /// Applied to every request, streamed bodies included.
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: ApiKey) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    pub fn new(mut config: GeminiConfig) -> Self {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            config,
        }
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.config.base_url, model, method)
    }

    async fn post(
        &self,
        url: &str,
        body: &GenerateContentRequest,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", self.config.api_key.expose())
            .json(body)
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Gemini request failed");
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok(response)
    }

    async fn generate_content(
        &self,
        model: &str,
        body: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ProviderError> {
        let url = self.endpoint(model, "generateContent");
        let response = self.post(&url, body).await?;
        response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Connection(e.to_string())
    }
}

/// Pulls the human readable message out of a Gemini error body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<WireErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) => body.trim().to_string(),
    }
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn text_model(&self) -> &str {
        &self.config.text_model
    }

    fn image_model(&self) -> &str {
        &self.config.image_model
    }

    async fn generate_text(&self, request: &TextRequest) -> Result<String, ProviderError> {
        debug!(
            model = %self.config.text_model,
            json = request.response_schema.is_some(),
            "Sending generateContent request"
        );
        let body = GenerateContentRequest::from(request);
        let response = self.generate_content(&self.config.text_model, &body).await?;
        response.text()
    }

    async fn stream_text(&self, request: &TextRequest) -> Result<TextStream, ProviderError> {
        debug!(model = %self.config.text_model, "Sending streamGenerateContent request");
        let body = GenerateContentRequest::from(request);
        let url = format!(
            "{}?alt=sse",
            self.endpoint(&self.config.text_model, "streamGenerateContent")
        );
        let response = self.post(&url, &body).await?;
        Ok(sse_text_stream(response.bytes_stream().boxed()))
    }

    async fn generate_image(
        &self,
        request: &ImageRequest,
    ) -> Result<Option<InlineImage>, ProviderError> {
        debug!(
            model = %self.config.image_model,
            with_image_config = request.image_config.is_some(),
            "Sending image generation request"
        );
        let body = GenerateContentRequest::from(request);
        let response = self
            .generate_content(&self.config.image_model, &body)
            .await?;
        Ok(response.image())
    }
}

// =========================================================================
// Server-sent events
// =========================================================================

/// Splits a byte stream into SSE `data:` payloads. Bytes are buffered until
/// a full line is available, so multi-byte characters split across chunks
/// survive.
#[derive(Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(payload) = data_payload(&line) {
                payloads.push(payload);
            }
        }
        payloads
    }

    fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        data_payload(&rest)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let payload = line.trim_end_matches(['\r', '\n']).strip_prefix("data:")?.trim();
    if payload.is_empty() || payload == "[DONE]" {
        None
    } else {
        Some(payload.to_string())
    }
}

fn parse_stream_payload(payload: &str) -> Result<String, ProviderError> {
    if let Ok(envelope) = serde_json::from_str::<WireErrorEnvelope>(payload) {
        return Err(ProviderError::Api {
            status: envelope.error.code.unwrap_or(500),
            message: envelope.error.message,
        });
    }
    serde_json::from_str::<GenerateContentResponse>(payload)
        .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse stream chunk: {}", e)))?
        .text()
}

struct SseState {
    bytes: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    ended: bool,
}

fn sse_text_stream(bytes: BoxStream<'static, reqwest::Result<Bytes>>) -> TextStream {
    let state = SseState {
        bytes,
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        ended: false,
    };
    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(payload) = state.pending.pop_front() {
                match parse_stream_payload(&payload) {
                    Ok(text) if text.is_empty() => continue,
                    Ok(text) => return Some((Ok(text), state)),
                    Err(e) => {
                        state.pending.clear();
                        state.ended = true;
                        return Some((Err(e), state));
                    }
                }
            }
            if state.ended {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let payloads = state.decoder.push(&chunk);
                    state.pending.extend(payloads);
                }
                Some(Err(e)) => {
                    state.ended = true;
                    return Some((Err(map_reqwest_error(e)), state));
                }
                None => {
                    state.ended = true;
                    state.pending.extend(state.decoder.finish());
                }
            }
        }
    })
    .boxed()
}

// =========================================================================
// Gemini API types
// =========================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    contents: Vec<WireContent>,
    generation_config: WireGenerationConfig,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, alias = "inline_data", skip_serializing_if = "Option::is_none")]
    inline_data: Option<WireBlob>,
    /// Set on reasoning summaries, which are not part of the answer.
    #[serde(default, skip_serializing)]
    thought: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireBlob {
    #[serde(default, alias = "mime_type")]
    mime_type: String,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<WireThinkingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_config: Option<WireImageConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireThinkingConfig {
    thinking_level: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireImageConfig {
    aspect_ratio: String,
    image_size: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    #[serde(default)]
    prompt_feedback: Option<WirePromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    #[serde(default)]
    content: Option<WireContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireErrorEnvelope {
    error: WireError,
}

#[derive(Debug, Deserialize)]
struct WireError {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
}

impl GenerateContentResponse {
    fn parts(&self) -> impl Iterator<Item = &WirePart> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| content.parts.iter())
            .into_iter()
            .flatten()
    }

    fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
    }

    /// Answer text without reasoning parts.
    fn text(&self) -> Result<String, ProviderError> {
        if self.candidates.is_empty() {
            if let Some(reason) = self.block_reason() {
                return Err(ProviderError::InvalidResponse(format!(
                    "Prompt blocked: {}",
                    reason
                )));
            }
        }
        Ok(self
            .parts()
            .filter(|p| !p.thought)
            .filter_map(|p| p.text.as_deref())
            .collect())
    }

    fn image(&self) -> Option<InlineImage> {
        if let Some(reason) = self.block_reason() {
            warn!(reason = %reason, "Image prompt was blocked");
        }
        self.parts()
            .filter_map(|p| p.inline_data.as_ref())
            .find(|blob| !blob.data.is_empty())
            .map(|blob| InlineImage {
                mime_type: blob.mime_type.clone(),
                data: blob.data.clone(),
            })
    }
}

impl From<&Part> for WirePart {
    fn from(part: &Part) -> Self {
        match part {
            Part::Text(text) => WirePart {
                text: Some(text.clone()),
                ..Default::default()
            },
            Part::InlineData { mime_type, data } => WirePart {
                inline_data: Some(WireBlob {
                    mime_type: mime_type.clone(),
                    data: data.clone(),
                }),
                ..Default::default()
            },
        }
    }
}

fn user_content(parts: Vec<WirePart>) -> WireContent {
    WireContent {
        role: Some("user".to_string()),
        parts,
    }
}

impl From<&TextRequest> for GenerateContentRequest {
    fn from(request: &TextRequest) -> Self {
        let system_instruction = request.system_instruction.as_ref().map(|text| WireContent {
            role: None,
            parts: vec![WirePart {
                text: Some(text.clone()),
                ..Default::default()
            }],
        });
        let json_output = request.response_schema.is_some();
        Self {
            system_instruction,
            contents: vec![user_content(request.parts.iter().map(WirePart::from).collect())],
            generation_config: WireGenerationConfig {
                temperature: request.temperature,
                response_mime_type: json_output.then(|| "application/json".to_string()),
                response_schema: request.response_schema.clone(),
                thinking_config: Some(WireThinkingConfig {
                    thinking_level: "low".to_string(),
                }),
                ..Default::default()
            },
        }
    }
}

impl From<&ImageRequest> for GenerateContentRequest {
    fn from(request: &ImageRequest) -> Self {
        Self {
            system_instruction: None,
            contents: vec![user_content(vec![WirePart::from(&Part::Text(
                request.prompt.clone(),
            ))])],
            generation_config: WireGenerationConfig {
                response_modalities: Some(vec!["TEXT".to_string(), "IMAGE".to_string()]),
                image_config: request.image_config.as_ref().map(|c| WireImageConfig {
                    aspect_ratio: c.aspect_ratio.clone(),
                    image_size: c.image_size.clone(),
                }),
                ..Default::default()
            },
        }
    }
}

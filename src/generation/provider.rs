//! Generation provider trait definition.

use super::types::{ImageRequest, InlineImage, TextRequest};
use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

/// Errors that can occur when talking to a generation provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Request timeout")]
    Timeout,

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ProviderError {
    /// True when the provider rejected the credential, so the user has to
    /// enter a new one.
    pub fn is_invalid_credential(&self) -> bool {
        match self {
            ProviderError::Api { status, message } => {
                *status == 401 || *status == 403 || message.contains("API key not valid")
            }
            _ => false,
        }
    }
}

/// Lazy, finite stream of text deltas. Polling it drives the request.
pub type TextStream = BoxStream<'static, Result<String, ProviderError>>;

/// Transport to a generative AI backend.
///
/// Implementations only move requests and responses; prompt building and
/// response cleanup live in [`super::GenerationClient`].
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Get the provider's name (e.g., "gemini").
    fn name(&self) -> &str;

    fn text_model(&self) -> &str;

    fn image_model(&self) -> &str;

    /// Run a text request and return the whole answer.
    async fn generate_text(&self, request: &TextRequest) -> Result<String, ProviderError>;

    /// Run a text request, yielding the answer as it is produced.
    async fn stream_text(&self, request: &TextRequest) -> Result<TextStream, ProviderError>;

    /// Run an image request. `Ok(None)` means the answer carried no image.
    async fn generate_image(
        &self,
        request: &ImageRequest,
    ) -> Result<Option<InlineImage>, ProviderError>;
}

//! Generative AI access for song artifacts.
//!
//! This module provides:
//! - A provider abstraction over the text and image backend (Gemini)
//! - Prompt building and lenient parsing of structured answers
//! - [`GenerationClient`], the song-level operations used by the pipeline

mod client;
mod gemini;
pub mod normalize;
mod parse;
pub mod prompts;
mod provider;
mod style;
mod types;

pub use client::{
    ClientSettings, CoverStyle, GenerationClient, GenerationError, LyricsStream, RANDOM_CATEGORY,
};
pub use gemini::{
    ApiKey, GeminiConfig, GeminiProvider, DEFAULT_BASE_URL, DEFAULT_IMAGE_MODEL,
    DEFAULT_TEXT_MODEL, DEFAULT_TIMEOUT,
};
pub use parse::{Fallback, MalformedResponse, Parsed, ParsedExt, RawStyle};
pub use provider::{GenerationProvider, ProviderError, TextStream};
pub use style::{GeneratedStyle, PromptLength, DEFAULT_STYLE_INFLUENCE, DEFAULT_WEIRDNESS};
pub use types::{
    GenerationLimits, ImageConfig, ImageRequest, InlineImage, Locale, Part, TextRequest,
};

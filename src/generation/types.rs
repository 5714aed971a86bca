//! Request and response types shared by generation providers.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Language used for free-text explanations (recommendation reasons,
/// generated topics). Lyrics language is driven by the concept instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    De,
    En,
}

impl Locale {
    /// Language name as it should appear inside a prompt.
    pub fn language_name(self) -> &'static str {
        match self {
            Locale::De => "German",
            Locale::En => "English",
        }
    }
}

/// One piece of a multimodal request.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    /// Base64 payload with its mime type.
    InlineData { mime_type: String, data: String },
}

/// A text generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRequest {
    pub system_instruction: Option<String>,
    pub parts: Vec<Part>,
    pub temperature: Option<f32>,
    /// When set the provider is asked for JSON matching this schema.
    pub response_schema: Option<serde_json::Value>,
}

impl TextRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system_instruction: None,
            parts: vec![Part::Text(prompt.into())],
            temperature: None,
            response_schema: None,
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_json_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    /// Puts an inline attachment in front of the text parts.
    pub fn with_inline_data(mut self, mime_type: impl Into<String>, data: String) -> Self {
        self.parts.insert(
            0,
            Part::InlineData {
                mime_type: mime_type.into(),
                data,
            },
        );
        self
    }

    /// Concatenated text parts, handy for logging and fakes.
    pub fn prompt_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                Part::InlineData { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageConfig {
    pub aspect_ratio: String,
    pub image_size: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            aspect_ratio: "1:1".to_string(),
            image_size: "1K".to_string(),
        }
    }
}

/// An image generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub prompt: String,
    /// Some models reject the image config, so it is optional.
    pub image_config: Option<ImageConfig>,
}

/// Image bytes returned inline by the provider, still base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

impl InlineImage {
    pub fn to_data_url(&self) -> String {
        if self.data.starts_with("data:") {
            return self.data.clone();
        }
        let mime_type = if self.mime_type.is_empty() {
            "image/png"
        } else {
            &self.mime_type
        };
        format!("data:{};base64,{}", mime_type, self.data)
    }
}

/// Size limits applied to requests and generated artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationLimits {
    /// Length the model is asked to keep the style prompt under.
    pub style_prompt_target: usize,
    /// Above this length the prompt is flagged to the user.
    pub style_prompt_soft: usize,
    /// Style prompts are cut at this length.
    pub style_prompt_hard: usize,
    pub max_audio_bytes: usize,
    /// Cap for the lyrics directions fed back into style regeneration.
    pub regie_context_max_chars: usize,
}

impl Default for GenerationLimits {
    fn default() -> Self {
        Self {
            style_prompt_target: 120,
            style_prompt_soft: 200,
            style_prompt_hard: 1000,
            max_audio_bytes: 18 * 1024 * 1024,
            regie_context_max_chars: 600,
        }
    }
}

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_path: Option<String>,
    pub api_key: Option<String>,
    pub locale: Option<String>,
    pub lyrics_language: Option<String>,

    // Provider settings
    pub base_url: Option<String>,
    pub text_model: Option<String>,
    pub image_model: Option<String>,
    pub request_timeout_sec: Option<u64>,

    pub limits: Option<LimitsConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct LimitsConfig {
    pub style_prompt_target: Option<usize>,
    pub style_prompt_soft: Option<usize>,
    pub style_prompt_hard: Option<usize>,
    pub max_audio_mb: Option<usize>,
    pub regie_context_max_chars: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

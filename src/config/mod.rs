mod file_config;

pub use file_config::{FileConfig, LimitsConfig};

use crate::generation::{
    ApiKey, ClientSettings, GeminiConfig, GenerationError, GenerationLimits, Locale,
};
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub api_key: Option<String>,
    pub locale: Locale,
    pub lyrics_language: String,
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
    pub request_timeout_sec: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub api_key: Option<String>,
    pub locale: Locale,
    pub lyrics_language: String,

    // Provider
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
    pub request_timeout_sec: u64,

    pub limits: GenerationLimits,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_path must be specified via --db-path or in config file")
            })?;

        if db_path.is_dir() {
            bail!("db_path is a directory, expected a file: {:?}", db_path);
        }
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                bail!("Database directory does not exist: {:?}", parent);
            }
        }

        let api_key = file
            .api_key
            .map(|k| k.trim().to_string())
            .or_else(|| cli.api_key.clone())
            .filter(|k| !k.is_empty());

        let locale = match file.locale {
            Some(s) => parse_locale(&s).ok_or_else(|| {
                anyhow::anyhow!("Unknown locale {:?} in config file, expected de or en", s)
            })?,
            None => cli.locale,
        };

        let lyrics_language = file
            .lyrics_language
            .unwrap_or_else(|| cli.lyrics_language.clone());

        let base_url = file.base_url.unwrap_or_else(|| cli.base_url.clone());
        let text_model = file.text_model.unwrap_or_else(|| cli.text_model.clone());
        let image_model = file.image_model.unwrap_or_else(|| cli.image_model.clone());

        let request_timeout_sec = file
            .request_timeout_sec
            .unwrap_or(cli.request_timeout_sec);
        if request_timeout_sec == 0 {
            bail!("request_timeout_sec must be greater than 0");
        }

        // Limits - merge file config with defaults
        let limits_file = file.limits.unwrap_or_default();
        let defaults = GenerationLimits::default();
        let limits = GenerationLimits {
            style_prompt_target: limits_file
                .style_prompt_target
                .unwrap_or(defaults.style_prompt_target),
            style_prompt_soft: limits_file
                .style_prompt_soft
                .unwrap_or(defaults.style_prompt_soft),
            style_prompt_hard: limits_file
                .style_prompt_hard
                .unwrap_or(defaults.style_prompt_hard),
            max_audio_bytes: match limits_file.max_audio_mb {
                Some(mb) => mb.checked_mul(1024 * 1024).ok_or_else(|| {
                    anyhow::anyhow!("max_audio_mb is too large: {}", mb)
                })?,
                None => defaults.max_audio_bytes,
            },
            regie_context_max_chars: limits_file
                .regie_context_max_chars
                .unwrap_or(defaults.regie_context_max_chars),
        };
        if !(limits.style_prompt_target <= limits.style_prompt_soft
            && limits.style_prompt_soft <= limits.style_prompt_hard)
        {
            bail!(
                "Style prompt limits must satisfy target <= soft <= hard, got {} / {} / {}",
                limits.style_prompt_target,
                limits.style_prompt_soft,
                limits.style_prompt_hard
            );
        }

        Ok(Self {
            db_path,
            api_key,
            locale,
            lyrics_language,
            base_url,
            text_model,
            image_model,
            request_timeout_sec,
            limits,
        })
    }

    /// Provider configuration. Fails when no usable API key was configured.
    pub fn gemini_config(&self) -> Result<GeminiConfig, GenerationError> {
        let api_key = ApiKey::new(self.api_key.as_deref().unwrap_or_default())?;
        Ok(GeminiConfig {
            api_key,
            base_url: self.base_url.clone(),
            text_model: self.text_model.clone(),
            image_model: self.image_model.clone(),
            timeout: Duration::from_secs(self.request_timeout_sec),
        })
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            locale: self.locale,
            lyrics_language: self.lyrics_language.clone(),
            limits: self.limits.clone(),
        }
    }
}

/// Parses a locale string, uses clap's ValueEnum trait for parsing.
fn parse_locale(s: &str) -> Option<Locale> {
    Locale::from_str(s, true).ok()
}

//! Parsing of structured (JSON) model answers.
//!
//! Parsers are pure and report malformed input as [`MalformedResponse`].
//! The client pairs the error with a deterministic default in a
//! [`Fallback`], and callers decide whether to accept it.

use super::normalize::extract_json;
use crate::concept::{AudioAnalysis, PartialSongConcept};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Malformed {what} response: {reason}")]
pub struct MalformedResponse {
    pub what: &'static str,
    pub reason: String,
}

impl MalformedResponse {
    fn new(what: &'static str, reason: impl Into<String>) -> Self {
        Self {
            what,
            reason: reason.into(),
        }
    }
}

/// A parse failure together with the value to use instead.
#[derive(Debug)]
pub struct Fallback<T> {
    pub error: MalformedResponse,
    pub value: T,
}

/// Outcome of parsing a structured answer.
pub type Parsed<T> = Result<T, Fallback<T>>;

pub trait ParsedExt<T> {
    /// Takes the parsed value, or logs the failure and takes the default.
    fn or_fallback(self) -> T;
}

impl<T> ParsedExt<T> for Parsed<T> {
    fn or_fallback(self) -> T {
        self.unwrap_or_else(|fallback| {
            warn!(error = %fallback.error, "Using default values");
            fallback.value
        })
    }
}

pub(crate) fn with_fallback<T>(
    result: Result<T, MalformedResponse>,
    fallback: impl FnOnce() -> T,
) -> Parsed<T> {
    result.map_err(|error| Fallback {
        error,
        value: fallback(),
    })
}

/// Style fields as the model returned them, before defaults and clamping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawStyle {
    pub prompt: Option<String>,
    pub prompt_effect: Option<String>,
    pub similar_artists: Option<String>,
    pub weirdness: Option<Value>,
    pub style_influence: Option<Value>,
    pub recommendation_reason: Option<String>,
    pub song_description: Option<String>,
}

fn parse_object(raw: &str, what: &'static str) -> Result<Map<String, Value>, MalformedResponse> {
    let json = extract_json(raw);
    if json.is_empty() {
        return Err(MalformedResponse::new(what, "empty response"));
    }
    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(MalformedResponse::new(
            what,
            format!("expected a JSON object, got {}", json_kind(&other)),
        )),
        Err(e) => Err(MalformedResponse::new(what, e.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Reads a list of strings, tolerating a single comma separated string.
fn string_list(map: &Map<String, Value>, key: &str) -> Vec<String> {
    let values: Vec<String> = match map.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str())
            .map(|s| s.trim().to_string())
            .collect(),
        Some(Value::String(s)) => s.split(',').map(|s| s.trim().to_string()).collect(),
        _ => Vec::new(),
    };
    values.into_iter().filter(|s| !s.is_empty()).collect()
}

fn text_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Array(items)) => {
            let joined = items
                .iter()
                .filter_map(|item| item.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", ");
            (!joined.is_empty()).then_some(joined)
        }
        _ => None,
    }
}

fn bool_field(map: &Map<String, Value>, key: &str) -> bool {
    match map.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn suggestions_from(map: &Map<String, Value>) -> PartialSongConcept {
    PartialSongConcept {
        genre: string_list(map, "genre"),
        mood: string_list(map, "mood"),
        tempo: string_list(map, "tempo"),
        instrumentation: string_list(map, "instrumentation"),
        vocals: string_list(map, "vocals"),
        language: string_list(map, "language"),
    }
}

pub fn parse_topic_analysis(raw: &str) -> Result<PartialSongConcept, MalformedResponse> {
    parse_object(raw, "topic analysis").map(|map| suggestions_from(&map))
}

pub fn parse_audio_analysis(raw: &str) -> Result<AudioAnalysis, MalformedResponse> {
    let map = parse_object(raw, "audio analysis")?;
    Ok(AudioAnalysis {
        suggestions: suggestions_from(&map),
        is_instrumental: bool_field(&map, "isInstrumental"),
        topic_suggestion: text_field(&map, "topicSuggestion").unwrap_or_default(),
    })
}

pub fn parse_style(raw: &str) -> Result<RawStyle, MalformedResponse> {
    let map = parse_object(raw, "style")?;
    Ok(RawStyle {
        prompt: text_field(&map, "prompt"),
        prompt_effect: text_field(&map, "promptEffect"),
        similar_artists: text_field(&map, "similarArtists"),
        weirdness: map.get("weirdness").cloned(),
        style_influence: map.get("styleInfluence").cloned(),
        recommendation_reason: text_field(&map, "recommendationReason"),
        song_description: text_field(&map, "songDescription"),
    })
}

pub fn parse_style_tags(raw: &str) -> Result<Vec<String>, MalformedResponse> {
    let json = extract_json(raw);
    match serde_json::from_str::<Value>(json) {
        Ok(Value::Array(items)) => Ok(items
            .iter()
            .filter_map(|item| item.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()),
        Ok(other) => Err(MalformedResponse::new(
            "style tags",
            format!("expected a JSON array, got {}", json_kind(&other)),
        )),
        Err(e) => Err(MalformedResponse::new("style tags", e.to_string())),
    }
}

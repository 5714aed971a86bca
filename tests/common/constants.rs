//! Shared constants for pipeline tests
//!
//! Canned provider answers. When the fake answers change, update only
//! this file.

// ============================================================================
// Text answers
// ============================================================================

/// Answer to a random topic request
pub const RANDOM_TOPIC: &str = "Ein Leuchtturm im Nebel";

/// Valid topic analysis, including vocals that instrumental songs must drop
pub const TOPIC_ANALYSIS_JSON: &str = r#"{
    "genre": ["Indie Folk"],
    "mood": ["Melancholisch"],
    "tempo": ["Mid-tempo"],
    "instrumentation": ["Akustikgitarre", "Cello"],
    "vocals": ["Female"],
    "language": ["German"]
}"#;

/// Audio analysis of an instrumental reference
pub const AUDIO_ANALYSIS_JSON: &str = r#"{
    "genre": ["Ambient"],
    "mood": ["Ruhig"],
    "tempo": ["Slow"],
    "instrumentation": ["Synth Pads"],
    "vocals": ["Choir"],
    "language": ["Latin"],
    "isInstrumental": true,
    "topicSuggestion": "Nebel über dem Hafen"
}"#;

/// Valid style answer
pub const STYLE_JSON: &str = r#"{
    "prompt": "indie folk, airy female vocals, fingerpicked guitar, warm cello",
    "promptEffect": "Intim und warm",
    "similarArtists": "Phoebe Bridgers, Bon Iver",
    "weirdness": 40,
    "styleInfluence": 70,
    "recommendationReason": "Ruhige Produktion passend zum Thema",
    "songDescription": "Ein Wärter wartet auf ein Schiff, das nie kommt."
}"#;

/// Expected prompt of [`STYLE_JSON`]
pub const STYLE_PROMPT: &str = "indie folk, airy female vocals, fingerpicked guitar, warm cello";

/// Style answer with a fractional weirdness
pub const FRACTIONAL_STYLE_JSON: &str = r#"{
    "prompt": "dark synthwave",
    "weirdness": 0.9,
    "styleInfluence": 0.5
}"#;

/// Extra style tags
pub const STYLE_TAGS_JSON: &str = r#"["dream pop", "lo-fi", "tape hiss"]"#;

// ============================================================================
// Images
// ============================================================================

pub const COVER_MIME: &str = "image/png";

/// Base64 PNG signature, enough for a data URL
pub const COVER_DATA: &str = "iVBORw0KGgo=";

pub const COVER_URL: &str = "data:image/png;base64,iVBORw0KGgo=";

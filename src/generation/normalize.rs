//! Cleanup of raw model output.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

lazy_static! {
    static ref INTRO_LINE: Regex =
        Regex::new(r"(?i)^(hier ist|here is|this is|hier der|folgend(er|es)|###\s*\d*\.?\s*)")
            .unwrap();
    static ref META_HEADING: Regex = Regex::new(
        r"(?i)^#+\s*(\d+\.?\s*)?(style description|songtext|suno prompt|regieanweisungen)"
    )
    .unwrap();
    static ref DIRECTION: Regex = Regex::new(r"\[(.*?)\]").unwrap();
    static ref EXCESS_BLANK_LINES: Regex = Regex::new(r"\n{3,}").unwrap();
}

pub const SCORE_MIN: u8 = 15;
pub const SCORE_MAX: u8 = 85;
pub const SCORE_MIDPOINT: u8 = 50;

/// Undoes URL encoding that sometimes leaks into model text.
///
/// `+` becomes a space. If the text holds a malformed escape or decodes to
/// invalid UTF-8 only `%20` is replaced.
pub fn clean_text(text: &str) -> String {
    let spaced = text.replace('+', " ");
    if has_malformed_escape(&spaced) {
        return spaced.replace("%20", " ");
    }
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced.replace("%20", " "),
    }
}

fn has_malformed_escape(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex_pair = bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit);
            if !hex_pair {
                return true;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    false
}

/// Drops chatty intro sentences and meta headings the model puts in front
/// of the lyrics. Output starts at the first tag or sung line.
pub fn strip_lyrics_preamble(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut start = 0;
    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if INTRO_LINE.is_match(trimmed) || META_HEADING.is_match(trimmed) {
            start = i + 1;
            continue;
        }
        start = i;
        break;
    }
    lines
        .get(start..)
        .unwrap_or_default()
        .join("\n")
        .trim()
        .to_string()
}

/// Maps a model-provided slider value onto the safe 15..=85 range.
///
/// Fractions in (0, 1] are read as percentages. Values outside [0, 100] and
/// anything non-numeric fall back to the midpoint. A missing value uses
/// `default`.
pub fn normalize_score(value: Option<&Value>, default: u8) -> u8 {
    let raw = match value {
        None | Some(Value::Null) => f64::from(default),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
        Some(_) => f64::NAN,
    };
    normalize_score_value(raw)
}

pub fn normalize_score_value(raw: f64) -> u8 {
    let scaled = if raw > 0.0 && raw <= 1.0 {
        raw * 100.0
    } else {
        raw
    };
    let in_range = if scaled.is_finite() && (0.0..=100.0).contains(&scaled) {
        scaled
    } else {
        f64::from(SCORE_MIDPOINT)
    };
    (in_range.round() as u8).clamp(SCORE_MIN, SCORE_MAX)
}

/// Cuts `text` to at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

/// Sung text only: bracketed directions removed, runs of blank lines
/// collapsed.
pub fn strip_directions(lyrics: &str) -> String {
    let without_tags = DIRECTION.replace_all(lyrics, "");
    let trimmed_lines = without_tags
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    EXCESS_BLANK_LINES
        .replace_all(&trimmed_lines, "\n\n")
        .trim()
        .to_string()
}

/// Distinct bracketed directions of the lyrics, joined with `; `.
pub fn regie_context(lyrics: &str, max_chars: usize) -> Option<String> {
    let mut seen: Vec<&str> = Vec::new();
    for capture in DIRECTION.captures_iter(lyrics) {
        let direction = capture.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        if !direction.is_empty() && !seen.contains(&direction) {
            seen.push(direction);
        }
    }
    if seen.is_empty() {
        return None;
    }
    Some(truncate_chars(&seen.join("; "), max_chars))
}

/// Strips a markdown code fence around a JSON answer, if any.
pub fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
            let body = body.trim_end();
            body.strip_suffix("```").unwrap_or(body).trim()
        }
        None => trimmed,
    }
}

/// Removes quoting the model wraps around one-line answers.
pub fn strip_quotes(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '"' | '\u{201C}' | '\u{201D}' | '\u{201E}'))
        .collect::<String>()
        .trim()
        .trim_matches('\'')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clean_text_decodes_url_encoding() {
        assert_eq!(clean_text("Sommer%20am%20See"), "Sommer am See");
        assert_eq!(clean_text("Sommer+am+See"), "Sommer am See");
        assert_eq!(clean_text("K%C3%BCste"), "Küste");
        assert_eq!(clean_text("plain text"), "plain text");
    }

    #[test]
    fn test_clean_text_falls_back_on_malformed_escape() {
        assert_eq!(clean_text("100% sicher%20heute"), "100% sicher heute");
        assert_eq!(clean_text("trailing %"), "trailing %");
        // Valid escape, invalid UTF-8
        assert_eq!(clean_text("caf%E9%20noir"), "caf%E9 noir");
    }

    #[test]
    fn test_strip_preamble_removes_intro_and_headings() {
        let raw = "Here is your song:\n\n### 2. Songtext\n[Intro]\nFirst line\nSecond line\n";
        assert_eq!(strip_lyrics_preamble(raw), "[Intro]\nFirst line\nSecond line");
    }

    #[test]
    fn test_strip_preamble_german_intro() {
        let raw = "Hier ist der Entwurf für deinen Song\r\n## Songtext\r\n\r\n[Verse 1]\r\nIm Morgengrauen";
        assert_eq!(strip_lyrics_preamble(raw), "[Verse 1]\nIm Morgengrauen");
    }

    #[test]
    fn test_strip_preamble_keeps_clean_lyrics() {
        let raw = "\n  [Chorus]\nWe ride the night\n";
        assert_eq!(strip_lyrics_preamble(raw), "[Chorus]\nWe ride the night");
    }

    #[test]
    fn test_strip_preamble_only_preamble() {
        assert_eq!(strip_lyrics_preamble("Here is nothing else"), "");
        assert_eq!(strip_lyrics_preamble(""), "");
    }

    #[test]
    fn test_normalize_score_scales_fractions() {
        assert_eq!(normalize_score(Some(&json!(0.9)), 50), 85);
        assert_eq!(normalize_score(Some(&json!(0.42)), 50), 42);
        assert_eq!(normalize_score(Some(&json!(1)), 50), 85);
        assert_eq!(normalize_score(Some(&json!(0.05)), 50), 15);
    }

    #[test]
    fn test_normalize_score_clamps_percentages() {
        assert_eq!(normalize_score(Some(&json!(0)), 50), 15);
        assert_eq!(normalize_score(Some(&json!(10)), 50), 15);
        assert_eq!(normalize_score(Some(&json!(60)), 50), 60);
        assert_eq!(normalize_score(Some(&json!(99.6)), 50), 85);
        assert_eq!(normalize_score(Some(&json!(70.5)), 50), 71);
    }

    #[test]
    fn test_normalize_score_out_of_range_and_garbage() {
        assert_eq!(normalize_score(Some(&json!(250)), 65), 50);
        assert_eq!(normalize_score(Some(&json!(-3)), 65), 50);
        assert_eq!(normalize_score(Some(&json!("high")), 65), 50);
        assert_eq!(normalize_score(Some(&json!([1, 2])), 65), 50);
        assert_eq!(normalize_score(Some(&json!("72")), 65), 72);
    }

    #[test]
    fn test_normalize_score_missing_uses_default() {
        assert_eq!(normalize_score(None, 65), 65);
        assert_eq!(normalize_score(Some(&Value::Null), 50), 50);
    }

    #[test]
    fn test_normalize_score_always_in_safe_range() {
        let mut raw = -10.0;
        while raw <= 120.0 {
            let score = normalize_score_value(raw);
            assert!((SCORE_MIN..=SCORE_MAX).contains(&score), "raw {raw} gave {score}");
            raw += 0.25;
        }
        assert_eq!(normalize_score_value(f64::NAN), 50);
        assert_eq!(normalize_score_value(f64::INFINITY), 50);
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("Grüße", 3), "Grü");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_strip_directions() {
        let lyrics = "[Intro · Rhodes pno]\n\n\n\n[Verse 1: Sonja]\nLichter am Fluss\nNebel im Haar [ad-lib]\n\n\n\n[Chorus]\nWir bleiben\n";
        assert_eq!(
            strip_directions(lyrics),
            "Lichter am Fluss\nNebel im Haar\n\nWir bleiben"
        );
    }

    #[test]
    fn test_regie_context_dedupes_and_caps() {
        let lyrics = "[Intro · soft brushes]\nLine\n[Chorus]\nLine\n[Chorus]\n[ ]\n[Outro · fade]";
        assert_eq!(
            regie_context(lyrics, 100).as_deref(),
            Some("Intro · soft brushes; Chorus; Outro · fade")
        );
        assert_eq!(regie_context(lyrics, 5).as_deref(), Some("Intro"));
        assert_eq!(regie_context("no tags here", 100), None);
    }

    #[test]
    fn test_extract_json_strips_fences() {
        assert_eq!(extract_json("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(extract_json("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(extract_json("```\n[1]\n```  "), "[1]");
    }

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("\"Ein Sommer in Lissabon\""), "Ein Sommer in Lissabon");
        assert_eq!(strip_quotes("„Der letzte Bus“"), "Der letzte Bus");
        assert_eq!(strip_quotes("'Mary's garden'"), "Mary's garden");
    }
}

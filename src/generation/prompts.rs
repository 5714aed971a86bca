//! Prompt texts and response schemas sent to the text and image models.

use super::client::CoverStyle;
use super::types::Locale;
use crate::concept::SongConcept;
use serde_json::{json, Value};

pub const SYSTEM_INSTRUCTION: &str = "\
You are an elite music producer, recording engineer and professional songwriter \
with decades of studio and stage experience.

Language and craft:
- Replace vague words (beautiful, sad, powerful) with musical parameters: keys, \
intervals, chord types such as maj7 or 9th, articulation (staccato, legato, marcato, \
muted, pizzicato) and precise instruments (Rhodes Piano, Upright Bass, Piccolo Trumpet).
- Describe the room and microphone setup (close-miking, dry, plate reverb, concert hall).
- Every style result names a BPM value and a rhythmic feel (swing, straight, halftime). \
Musician abbreviations (tpt, sax, pno, dr) are welcome to save characters.
- Only suggest brass when the genre calls for it.

Lyrics format for music models:
- Everything inside square brackets is a direction and is never sung: section tags \
([Intro], [Verse], [Chorus], [Bridge], [Outro]) and performance notes \
([Syncopated bassline, ghost notes on snare]).
- Everything outside square brackets is sung text. No explanations outside brackets.
- Name every voice once at the start ([Mara: Female. Breathy mezzo, head voice.]) and \
repeat the name on each section and speaker change ([Verse 1: Mara], \
[Call and Response: Mara / Jon], [Ad-lib: Jon - spoken]).
- When the idea references an artist, use the artist's first name as the voice name.

Originality:
- Never reproduce existing lyrics. When a known song is referenced, keep its meter, \
rhyme scheme and phrasing but write entirely new words.
- Avoid cliches and forced rhymes; every line must earn its place.

Output discipline:
- No intro sentences, no small talk, no markdown headings. The first line of a lyrics \
answer is either a bracketed tag or the first sung line.";

const TOPIC_INSTRUCTION: &str = "\
You are a ghostwriter for song ideas. Come up with one concrete, down-to-earth song idea \
of 5 to 15 words: everyday life, nature, love, travel, memories, seasons, small stories, \
moods between people. No science fiction, no robots or AI, nothing bizarre. \
Answer with the idea only.";

/// Prompt for a random topic. `category` narrows the theme.
pub fn random_topic(category: Option<&str>, locale: Locale, seed: &str) -> (String, &'static str) {
    let theme = match category.map(str::trim).filter(|c| !c.is_empty()) {
        Some(category) => format!("a song idea that fits the theme '{}'", category),
        None => "a song idea from everyday life, nature, love, travel or memories".to_string(),
    };
    let prompt = format!(
        "Write {} in {}. Down-to-earth, no sci-fi or AI. Seed: {}",
        theme,
        locale.language_name(),
        seed
    );
    (prompt, TOPIC_INSTRUCTION)
}

pub fn topic_analysis(topic: &str, is_instrumental: bool) -> String {
    let vocal_note = if is_instrumental {
        "This is an INSTRUMENTAL piece: 'language' and 'vocals' must be empty arrays. \
Focus on genre, mood, tempo and above all precise instrumentation."
    } else {
        "Also suggest fitting language and vocals."
    };
    format!(
        "Analyze this song idea for a music generation model. Topic: \"{}\". {} \
Return genre, mood, tempo and precise instrumentation (specific instruments, no vague \
groups). If the topic references an artist or song, keep that reference in mind.",
        topic.trim(),
        vocal_note
    )
}

fn string_array_schema() -> Value {
    json!({ "type": "ARRAY", "items": { "type": "STRING" } })
}

pub fn topic_analysis_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "language": string_array_schema(),
            "vocals": string_array_schema(),
            "genre": string_array_schema(),
            "mood": string_array_schema(),
            "tempo": string_array_schema(),
            "instrumentation": string_array_schema(),
        },
        "required": ["genre", "mood", "tempo", "instrumentation", "language", "vocals"],
    })
}

pub fn audio_analysis(locale: Locale) -> String {
    let language = locale.language_name();
    format!(
        "Analyze this audio file as an experienced music producer.
- genre: fitting genre names (at most 3, e.g. \"Indie Rock\", \"Lo-Fi Hip Hop\")
- mood: moods of the piece (at most 4, in {language})
- tempo: estimated BPM and feel (e.g. [\"128 BPM\", \"Driving\"])
- instrumentation: detected instruments, as precise as possible
- vocals: vocal style if present, empty array for instrumentals
- language: sung language(s) if present, empty array for instrumentals
- isInstrumental: true if no vocals can be heard
- topicSuggestion: one or two sentences in {language} describing the mood and character, \
usable as a song topic
Answer with valid JSON only."
    )
}

pub fn audio_analysis_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "genre": string_array_schema(),
            "mood": string_array_schema(),
            "tempo": string_array_schema(),
            "instrumentation": string_array_schema(),
            "vocals": string_array_schema(),
            "language": string_array_schema(),
            "isInstrumental": { "type": "BOOLEAN" },
            "topicSuggestion": { "type": "STRING" },
        },
        "required": ["genre", "mood", "tempo", "instrumentation", "isInstrumental", "topicSuggestion"],
    })
}

pub fn lyrics(concept: &SongConcept, default_language: &str, seed: &str) -> String {
    let genres = concept.genre.join(", ");
    if concept.is_instrumental {
        return format!(
            "[SEED: {seed}] Instrumental structure. Topic: {topic}. Genre: {genres}.
- Produce only a sequence of bracketed direction tags such as [Intro], [Verse], [Chorus], \
[Bridge], [Solo], [Outro].
- Every tag carries precise playing directions, e.g. \
[Intro · Rhodes pno, upright bass, soft brush dr, close-miked, dry room].
- Use exact instrument names, articulation and room sound.
- No sung text at all, only structure and directions in brackets.",
            topic = concept.topic.trim(),
        );
    }
    let language = if concept.language.is_empty() {
        default_language.to_string()
    } else {
        concept.language.join(", ")
    };
    let mut prompt = format!(
        "[SEED: {seed}] Write completely new, original song lyrics at a professional level.
- Topic: {topic}. Language: {language}. Genre: {genres}. Mood: {mood}.",
        topic = concept.topic.trim(),
        mood = concept.mood.join(", "),
    );
    if !concept.tempo.is_empty() {
        prompt.push_str(&format!(" Tempo: {}.", concept.tempo.join(", ")));
    }
    if !concept.vocals.is_empty() {
        prompt.push_str(&format!(" Vocals: {}.", concept.vocals.join(", ")));
    }
    if !concept.instrumentation.is_empty() {
        prompt.push_str(&format!(
            " Instrumentation: {}.",
            concept.instrumentation.join(", ")
        ));
    }
    prompt.push_str(
        "
- Avoid kitsch and cliches; use original, narrative imagery.
- Sections and directions only in square brackets ([Intro], [Verse], [Pre-Chorus], \
[Chorus], [Bridge], [Outro]) with detailed playing directions inside, e.g. \
[Chorus · 125 BPM, straight feel, syncopated slap bass, minor 9th chords].
- Sung lines always without brackets. Rhymes follow the meter, nothing forced.
- No introduction, no markdown headings. The first line is a tag or the first sung line.",
    );
    prompt
}

pub fn style(
    concept: &SongConcept,
    locale: Locale,
    target_chars: usize,
    regie_context: Option<&str>,
) -> String {
    let mut prompt = format!(
        "Style context: {topic}. Genre: {genres}.
- Task: write an extremely compact, precise style prompt for a music generation model.
- The style prompt (JSON field \"prompt\") must be shorter than {target_chars} characters, \
contain a concrete BPM value and a clear feel (swing, straight, halftime), and name the key \
instrumentation and articulation. Musician abbreviations are welcome.
- Also return:
  - promptEffect: how the prompt shapes harmony, groove and articulation.
  - similarArtists: a few fitting references, comma separated.
  - weirdness: integer between 15 and 85 (originality). Experimental genres lean higher \
(55-75), mainstream lower (25-45).
  - styleInfluence: integer between 15 and 85 (adherence to lyrics and concept). Story \
driven songs lean higher (65-85), more freedom lower (25-45).
  - recommendationReason: 2 to 4 sentences in {reason_language} on why exactly these values \
fit this song, referring to topic, genre and mood.
  - songDescription: a short description of the song and its vibe, for cover art and story.",
        topic = concept.topic.trim(),
        genres = concept.genre.join(", "),
        reason_language = locale.language_name(),
    );
    if !concept.mood.is_empty() {
        prompt.push_str(&format!("\n- Mood: {}.", concept.mood.join(", ")));
    }
    if !concept.instrumentation.is_empty() {
        prompt.push_str(&format!(
            "\n- Requested instrumentation: {}.",
            concept.instrumentation.join(", ")
        ));
    }
    if let Some(context) = regie_context {
        prompt.push_str(&format!(
            "\n- Keep the style consistent with these lyrics directions: {}.",
            context
        ));
    }
    prompt
}

pub fn style_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "prompt": { "type": "STRING" },
            "promptEffect": { "type": "STRING" },
            "similarArtists": { "type": "STRING" },
            "weirdness": { "type": "INTEGER" },
            "styleInfluence": { "type": "INTEGER" },
            "recommendationReason": { "type": "STRING" },
            "songDescription": { "type": "STRING" },
        },
        "required": [
            "prompt", "promptEffect", "similarArtists", "weirdness",
            "styleInfluence", "recommendationReason", "songDescription"
        ],
    })
}

pub fn style_tags(concept: &SongConcept, count: usize) -> String {
    format!(
        "Suggest {} professional style tags for a music generation model. Topic: \"{}\". \
Genres: \"{}\". Focus on instrumentation and recording techniques.",
        count,
        concept.topic.trim(),
        concept.genre.join(", ")
    )
}

pub fn style_tags_schema() -> Value {
    string_array_schema()
}

pub fn cover(concept: &SongConcept, style: &CoverStyle) -> String {
    format!(
        "Create a single album cover image. Theme: \"{}\". Genre: {}. Style: {}. \
Visual only, no text or letters in the image.",
        concept.topic.trim(),
        concept.genre.join(", "),
        style.instruction()
    )
}

pub fn cover_fallback(concept: &SongConcept, style: &CoverStyle) -> String {
    format!(
        "Abstract album artwork, mood: {}, vibrant colors, {}, no text.",
        concept.mood.join(", "),
        style.instruction()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lyrics_prompt_defaults_language() {
        let mut concept = SongConcept::with_topic("Harbour lights");
        concept.genre = vec!["Folk".to_string()];
        let prompt = lyrics(&concept, "German", "abc123");
        assert!(prompt.contains("Language: German."));
        assert!(prompt.contains("[SEED: abc123]"));

        concept.language = vec!["English".to_string(), "French".to_string()];
        let prompt = lyrics(&concept, "German", "abc123");
        assert!(prompt.contains("Language: English, French."));
    }

    #[test]
    fn test_lyrics_prompt_instrumental_variant() {
        let mut concept = SongConcept::with_topic("Harbour lights");
        concept.set_instrumental(true);
        let prompt = lyrics(&concept, "German", "s");
        assert!(prompt.contains("Instrumental structure"));
        assert!(!prompt.contains("Language:"));
    }

    #[test]
    fn test_excluded_styles_never_reach_prompts() {
        let mut concept = SongConcept::with_topic("Harbour lights");
        concept.excluded_styles = vec!["Dubstep".to_string()];
        let everything = [
            lyrics(&concept, "German", "s"),
            style(&concept, Locale::En, 120, None),
            style_tags(&concept, 5),
            cover(&concept, &CoverStyle::Default),
            topic_analysis(&concept.topic, false),
        ];
        for prompt in everything {
            assert!(!prompt.contains("Dubstep"));
        }
    }

    #[test]
    fn test_style_prompt_includes_locale_and_context() {
        let concept = SongConcept::with_topic("Harbour lights");
        let prompt = style(&concept, Locale::De, 120, Some("Intro · soft brushes"));
        assert!(prompt.contains("shorter than 120 characters"));
        assert!(prompt.contains("in German"));
        assert!(prompt.contains("Intro · soft brushes"));
    }

    #[test]
    fn test_random_topic_prompt_category() {
        let (prompt, _) = random_topic(Some("Reisen"), Locale::De, "x1");
        assert!(prompt.contains("'Reisen'"));
        assert!(prompt.contains("in German"));
        let (generic, _) = random_topic(Some("  "), Locale::En, "x1");
        assert!(generic.contains("everyday life"));
    }
}

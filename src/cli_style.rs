//! Terminal rendering for the songsmith binary: songs, history and
//! streamed lyrics.

use clap::builder::styling::{AnsiColor, Style};
use clap::builder::Styles;
use crossterm::style::{Color, Stylize};
use songsmith::generation::normalize::strip_directions;
use songsmith::{SongConcept, SongHistoryItem};
use std::io::{self, Write};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ACCENT: Color = Color::Rgb {
    r: 255,
    g: 140,
    b: 105,
};
const DIRECTION: Color = Color::Rgb {
    r: 160,
    g: 140,
    b: 230,
};
const MUTED: Color = Color::DarkGrey;

const PANEL_MIN_WIDTH: usize = 48;
const PANEL_MAX_WIDTH: usize = 88;

pub fn get_styles() -> Styles {
    let heading = Style::new()
        .bold()
        .underline()
        .fg_color(Some(AnsiColor::Yellow.into()));
    let good = Style::new().bold().fg_color(Some(AnsiColor::Cyan.into()));
    let bad = Style::new().bold().fg_color(Some(AnsiColor::Red.into()));
    Styles::styled()
        .usage(heading)
        .header(heading)
        .literal(good)
        .valid(good)
        .invalid(bad)
        .error(bad)
        .placeholder(Style::new().fg_color(Some(AnsiColor::BrightBlack.into())))
}

// =============================================================================
// Status lines
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Saved,
    Failed,
    Caution,
    Working,
}

impl Notice {
    fn mark(self) -> &'static str {
        match self {
            Notice::Saved => "♪",
            Notice::Failed => "✗",
            Notice::Caution => "!",
            Notice::Working => "…",
        }
    }

    fn color(self) -> Color {
        match self {
            Notice::Saved => Color::Green,
            Notice::Failed => Color::Red,
            Notice::Caution => Color::Yellow,
            Notice::Working => MUTED,
        }
    }
}

/// One status line. Failures go to stderr.
pub fn notice(kind: Notice, message: &str) {
    let line = format!("{} {}", kind.mark().with(kind.color()).bold(), message);
    if kind == Notice::Failed {
        eprintln!("{}", line);
    } else {
        println!("{}", line);
    }
}

// =============================================================================
// Panels
// =============================================================================

enum PanelLine {
    Field { key: String, value: String, loud: bool },
    Text(String),
    Bullet(String),
}

impl PanelLine {
    fn width(&self, key_width: usize) -> usize {
        match self {
            PanelLine::Field { value, .. } => key_width + 2 + value.width(),
            PanelLine::Text(text) => text.width(),
            PanelLine::Bullet(item) => item.width() + 2,
        }
    }
}

/// A titled block with an open right side, so long lyric lines never have
/// to be padded or cut.
pub struct Panel {
    title: String,
    lines: Vec<PanelLine>,
}

impl Panel {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            lines: Vec::new(),
        }
    }

    pub fn field(&mut self, key: &str, value: &str) -> &mut Self {
        self.lines.push(PanelLine::Field {
            key: key.to_string(),
            value: value.to_string(),
            loud: false,
        });
        self
    }

    pub fn loud_field(&mut self, key: &str, value: &str) -> &mut Self {
        self.lines.push(PanelLine::Field {
            key: key.to_string(),
            value: value.to_string(),
            loud: true,
        });
        self
    }

    /// Multi-line text, one panel line per text line.
    pub fn text(&mut self, text: &str) -> &mut Self {
        self.lines
            .extend(text.lines().map(|line| PanelLine::Text(line.to_string())));
        self
    }

    pub fn bullet(&mut self, item: &str) -> &mut Self {
        self.lines.push(PanelLine::Bullet(item.to_string()));
        self
    }

    fn key_width(&self) -> usize {
        self.lines
            .iter()
            .filter_map(|line| match line {
                PanelLine::Field { key, .. } => Some(key.width()),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    fn rule_width(&self) -> usize {
        let key_width = self.key_width();
        let widest = self
            .lines
            .iter()
            .map(|line| line.width(key_width))
            .chain(std::iter::once(self.title.width() + 2))
            .max()
            .unwrap_or(0);
        (widest + 2).clamp(PANEL_MIN_WIDTH, PANEL_MAX_WIDTH)
    }

    pub fn print(&self) {
        let width = self.rule_width();
        let key_width = self.key_width();
        let title = ellipsize(&self.title, width - 4);
        let fill = width.saturating_sub(title.width() + 4);
        println!(
            "{}{}{}",
            "╭─ ".with(ACCENT),
            title.as_str().with(ACCENT).bold(),
            format!(" {}", "─".repeat(fill)).with(ACCENT)
        );
        let edge = "│ ".with(ACCENT);
        for line in &self.lines {
            match line {
                PanelLine::Field { key, value, loud } => {
                    let pad = " ".repeat(key_width - key.width());
                    let value = if *loud {
                        value.as_str().bold().to_string()
                    } else {
                        value.clone()
                    };
                    println!("{}{}{}  {}", edge, key.as_str().with(MUTED), pad, value);
                }
                PanelLine::Text(text) => println!("{}{}", edge, styled_lyric_line(text)),
                PanelLine::Bullet(item) => println!("{}{} {}", edge, "•".with(ACCENT), item),
            }
        }
        println!("{}", format!("╰{}", "─".repeat(width - 1)).with(ACCENT));
        println!();
    }
}

/// Bracketed directions such as `[Chorus]` are dimmed.
fn styled_lyric_line(line: &str) -> String {
    let trimmed = line.trim();
    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        line.with(DIRECTION).italic().to_string()
    } else {
        line.to_string()
    }
}

fn add_concept(panel: &mut Panel, concept: &SongConcept) {
    let fields = [
        ("Genre", &concept.genre),
        ("Mood", &concept.mood),
        ("Tempo", &concept.tempo),
        ("Vocals", &concept.vocals),
        ("Language", &concept.language),
        ("Instruments", &concept.instrumentation),
        ("Avoid", &concept.excluded_styles),
    ];
    for (name, values) in fields {
        if !values.is_empty() {
            panel.field(name, &values.join(", "));
        }
    }
    if concept.is_instrumental {
        panel.field("Vocals", "instrumental");
    }
}

pub fn print_concept(concept: &SongConcept) {
    let mut panel = Panel::new(&concept.topic);
    add_concept(&mut panel, concept);
    panel.print();
}

pub fn print_variants(variants: &[String; 2]) {
    for (i, lyrics) in variants.iter().enumerate() {
        Panel::new(&format!("Variant {}", i + 1)).text(lyrics).print();
    }
}

pub fn format_created(item: &SongHistoryItem) -> String {
    item.created_at()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "?".to_string())
}

/// Concept, lyrics and style of a saved song.
pub fn print_song(item: &SongHistoryItem, sung_only: bool) {
    let mut overview = Panel::new(item.title());
    overview
        .loud_field("ID", &item.id)
        .field("Created", &format_created(item));
    add_concept(&mut overview, &item.concept);
    overview.print();

    if sung_only {
        Panel::new("Lyrics")
            .text(&strip_directions(&item.lyrics))
            .print();
    } else {
        Panel::new("Lyrics").text(&item.lyrics).print();
    }

    let style = &item.style;
    let mut panel = Panel::new("Style");
    panel
        .text(&style.prompt)
        .field("Weirdness", &format!("{}%", style.weirdness))
        .field("Influence", &format!("{}%", style.style_influence));
    if !style.recommendation_reason.is_empty() {
        panel.field("Why", &style.recommendation_reason);
    }
    if !style.song_description.is_empty() {
        panel.field("Story", &style.song_description);
    }
    for artist in style.similar_artists_list() {
        panel.bullet(artist);
    }
    panel.print();
}

pub fn print_tags(topic: &str, tags: &[String]) {
    let mut panel = Panel::new(&format!("Tags for {}", topic));
    if tags.is_empty() {
        panel.text("(no suggestions this time)");
    }
    for tag in tags {
        panel.bullet(&format!("[{}]", tag));
    }
    panel.print();
}

// =============================================================================
// History table
// =============================================================================

const HISTORY_COLUMNS: [(&str, usize); 4] = [("ID", 36), ("Created", 16), ("Title", 32), ("Genre", 24)];

/// Saved songs, one row each, newest first as given.
pub fn print_history(items: &[SongHistoryItem]) {
    if items.is_empty() {
        notice(Notice::Caution, "No songs yet");
        return;
    }
    let header: Vec<String> = HISTORY_COLUMNS
        .iter()
        .map(|(name, width)| pad(name, *width))
        .collect();
    println!("{}", header.join("  ").with(ACCENT).bold());
    for item in items {
        let cells = [
            item.id.clone(),
            format_created(item),
            item.title().to_string(),
            item.concept.genre.join(", "),
        ];
        let row: Vec<String> = cells
            .iter()
            .zip(HISTORY_COLUMNS)
            .map(|(cell, (_, width))| pad(&ellipsize(cell, width), width))
            .collect();
        println!("{}", row.join("  "));
    }
    println!(
        "{}",
        format!("{} songs", items.len()).with(MUTED)
    );
}

fn pad(text: &str, width: usize) -> String {
    format!("{}{}", text, " ".repeat(width.saturating_sub(text.width())))
}

// =============================================================================
// Streaming
// =============================================================================

/// Echoes streamed lyrics to stdout as they arrive.
///
/// Directions are dimmed even when a bracket opens in one delta and closes
/// in a later one.
#[derive(Debug, Default)]
pub struct LyricsEcho {
    in_direction: bool,
}

impl LyricsEcho {
    /// Splits `delta` into runs, each flagged with whether it is inside a
    /// bracketed direction.
    fn runs(&mut self, delta: &str) -> Vec<(bool, String)> {
        let mut runs: Vec<(bool, String)> = Vec::new();
        for c in delta.chars() {
            let inside = self.in_direction || c == '[';
            match runs.last_mut() {
                Some((flag, run)) if *flag == inside => run.push(c),
                _ => runs.push((inside, c.to_string())),
            }
            if c == '[' {
                self.in_direction = true;
            } else if c == ']' || c == '\n' {
                self.in_direction = false;
            }
        }
        runs
    }

    pub fn push(&mut self, delta: &str) {
        let mut out = io::stdout().lock();
        for (inside, run) in self.runs(delta) {
            let _ = if inside {
                write!(out, "{}", run.as_str().with(DIRECTION).italic())
            } else {
                write!(out, "{}", run)
            };
        }
        let _ = out.flush();
    }

    pub fn finish(self) {
        println!();
    }
}

pub fn ask(question: &str) {
    print!("{} {} ", question, "›".with(ACCENT).bold());
    let _ = io::stdout().flush();
}

/// Cuts `text` to `max_width` terminal columns, marking the cut with `…`.
pub fn ellipsize(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > max_width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ellipsize() {
        assert_eq!(ellipsize("Leuchtturm", 20), "Leuchtturm");
        assert_eq!(ellipsize("Leuchtturm im Nebel", 10), "Leuchttur…");
        assert_eq!(ellipsize("夜の海辺", 5), "夜の…");
    }

    #[test]
    fn test_echo_tracks_directions_across_deltas() {
        let mut echo = LyricsEcho::default();
        assert_eq!(
            echo.runs("Licht\n[Cho"),
            vec![(false, "Licht\n".to_string()), (true, "[Cho".to_string())]
        );
        assert_eq!(
            echo.runs("rus]\nKomm"),
            vec![(true, "rus]".to_string()), (false, "\nKomm".to_string())]
        );
    }

    #[test]
    fn test_panel_width_follows_content() {
        let mut panel = Panel::new("Song");
        panel.field("Genre", "Folk");
        assert_eq!(panel.rule_width(), PANEL_MIN_WIDTH);

        let long_line = "la ".repeat(40);
        panel.text(&long_line);
        assert_eq!(panel.rule_width(), PANEL_MAX_WIDTH);
        assert_eq!(panel.key_width(), 5);
    }

    #[test]
    fn test_pad_uses_display_width() {
        assert_eq!(pad("ab", 4), "ab  ");
        assert_eq!(pad("夜", 4), "夜  ");
        assert_eq!(pad("toolong", 3), "toolong");
    }
}

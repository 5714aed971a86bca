use anyhow::{bail, Context, Result};
use base64::Engine;
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use songsmith::concept::apply_audio_analysis;
use songsmith::config::{AppConfig, CliConfig, FileConfig};
use songsmith::generation::{
    CoverStyle, GeminiProvider, GenerationClient, GenerationError, GenerationLimits, Locale,
    ParsedExt, PromptLength, DEFAULT_BASE_URL, DEFAULT_IMAGE_MODEL, DEFAULT_TEXT_MODEL,
};
use songsmith::{
    HistoryStore, PipelineError, SongConcept, SongPipeline, SqliteHistoryStore,
};

mod cli_style;
use cli_style::{
    ask, get_styles, notice, print_concept, print_history, print_song, print_tags,
    print_variants, LyricsEcho, Notice,
};

const API_KEY_ENV: &str = "SONGSMITH_API_KEY";

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(
    name = "songsmith",
    about = "Turns a song idea into lyrics, a style prompt and cover art",
    styles = get_styles(),
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("SONGSMITH_BUILD"), ")")
)]
struct CliArgs {
    /// Path to a TOML config file. Values in it override the flags.
    #[clap(long, global = true, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite song history database file.
    #[clap(long, global = true, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// Generation API key. Falls back to the SONGSMITH_API_KEY variable.
    #[clap(long, global = true)]
    pub api_key: Option<String>,

    /// Language of explanations and generated topics.
    #[clap(long, global = true, value_enum, default_value_t = Locale::De)]
    pub locale: Locale,

    /// Lyrics language used when the concept names none.
    #[clap(long, global = true, default_value = "German")]
    pub lyrics_language: String,

    #[clap(long, global = true, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[clap(long, global = true, default_value = DEFAULT_TEXT_MODEL)]
    pub text_model: String,

    #[clap(long, global = true, default_value = DEFAULT_IMAGE_MODEL)]
    pub image_model: String,

    /// Timeout in seconds for a single generation request.
    #[clap(long, global = true, default_value_t = 120)]
    pub request_timeout_sec: u64,

    #[command(subcommand)]
    pub command: Command,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_path: self.db_path.clone(),
            api_key: self
                .api_key
                .clone()
                .or_else(|| std::env::var(API_KEY_ENV).ok()),
            locale: self.locale,
            lyrics_language: self.lyrics_language.clone(),
            base_url: self.base_url.clone(),
            text_model: self.text_model.clone(),
            image_model: self.image_model.clone(),
            request_timeout_sec: self.request_timeout_sec,
        }
    }
}

#[derive(Args, Debug, Default)]
struct ConceptArgs {
    /// Song idea. Leave empty to get a random one.
    pub topic: Option<String>,

    #[clap(long, value_delimiter = ',')]
    pub genre: Vec<String>,

    #[clap(long, value_delimiter = ',')]
    pub mood: Vec<String>,

    #[clap(long, value_delimiter = ',')]
    pub tempo: Vec<String>,

    #[clap(long, value_delimiter = ',')]
    pub vocals: Vec<String>,

    /// Lyrics languages.
    #[clap(long, value_delimiter = ',')]
    pub language: Vec<String>,

    #[clap(long, value_delimiter = ',')]
    pub instrumentation: Vec<String>,

    /// Styles to avoid. Kept with the song, not sent to the model.
    #[clap(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Generate an instrumental track (no vocals, no language).
    #[clap(long)]
    pub instrumental: bool,
}

impl ConceptArgs {
    fn into_concept(self) -> SongConcept {
        let mut concept = SongConcept {
            topic: self.topic.unwrap_or_default(),
            genre: self.genre,
            mood: self.mood,
            tempo: self.tempo,
            language: self.language,
            vocals: self.vocals,
            instrumentation: self.instrumentation,
            excluded_styles: self.exclude,
            is_instrumental: false,
        };
        concept.set_instrumental(self.instrumental);
        concept
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a song: lyrics variants, style prompt and cover art.
    Create {
        #[command(flatten)]
        concept: ConceptArgs,

        /// Audio reference to derive genre, mood and instrumentation from.
        #[clap(long, value_parser = parse_path)]
        audio: Option<PathBuf>,

        /// Lyrics variant to keep (1 or 2). Asked interactively if omitted.
        #[clap(long, value_parser = clap::value_parser!(u8).range(1..=2))]
        variant: Option<u8>,

        /// Cover art style: a preset name such as "Watercolor", or a full
        /// instruction.
        #[clap(long, default_value = "Default")]
        cover_style: String,
    },

    /// Suggest a random song topic.
    Topic {
        /// Theme to draw the topic from.
        category: Option<String>,
    },

    /// Stream lyrics for a concept without saving anything.
    Lyrics {
        #[command(flatten)]
        concept: ConceptArgs,
    },

    /// List saved songs, newest first.
    List,

    /// Show a saved song.
    Show {
        id: String,

        /// Print only the sung lines, without bracketed directions.
        #[clap(long)]
        sung_only: bool,

        /// Write the cover image to this file.
        #[clap(long, value_parser = parse_path)]
        cover_out: Option<PathBuf>,
    },

    /// Delete a saved song.
    Delete { id: String },

    /// Generate a new cover for a saved song.
    Cover {
        id: String,

        #[clap(default_value = "Default")]
        style: String,
    },

    /// Generate a new style prompt for a saved song.
    Restyle { id: String },

    /// Write new lyrics for a saved song, streamed as they are written.
    Rewrite { id: String },

    /// Suggest extra style tags to drop into a saved song's lyrics.
    Tags { id: String },

    /// Edit a saved song.
    Edit {
        id: String,

        /// Replace the lyrics with the content of this file.
        #[clap(long, value_parser = parse_path)]
        lyrics_file: Option<PathBuf>,

        #[clap(long)]
        style_prompt: Option<String>,

        /// New song description.
        #[clap(long)]
        story: Option<String>,
    },

    /// Export the whole history as JSON.
    Export {
        /// Output file. Prints to stdout if omitted.
        #[clap(value_parser = parse_path)]
        output: Option<PathBuf>,
    },

    /// Import songs from an exported JSON file.
    Import {
        #[clap(value_parser = parse_path)]
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    if let Err(e) = run(cli_args.command, &config, &cancel).await {
        match e.downcast_ref::<PipelineError>() {
            Some(PipelineError::Cancelled) => notice(Notice::Caution, "Cancelled"),
            Some(pipeline_error) if pipeline_error.needs_credential() => {
                notice(Notice::Failed, &format!("{:#}", e));
                notice(Notice::Working, &format!(
                    "Set a valid key with --api-key, {} or api_key in the config file",
                    API_KEY_ENV
                ));
            }
            _ => notice(Notice::Failed, &format!("{:#}", e)),
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Command, config: &AppConfig, cancel: &CancellationToken) -> Result<()> {
    info!("Opening song history at {:?}...", config.db_path);
    let store = Arc::new(SqliteHistoryStore::new(&config.db_path)?);

    match command {
        Command::Create {
            concept,
            audio,
            variant,
            cover_style,
        } => {
            let mut pipeline = build_pipeline(config, store)?;
            let mut concept = concept.into_concept();
            if let Some(path) = audio {
                concept = with_audio_reference(pipeline.client(), concept, &path, cancel).await?;
            }
            let cover_style = CoverStyle::from_input(&cover_style);
            create_song(&mut pipeline, concept, variant, cover_style, cancel).await
        }
        Command::Topic { category } => {
            let mut pipeline = build_pipeline(config, store)?;
            let topic = pipeline
                .regenerate_topic(category.as_deref(), cancel)
                .await?;
            println!("{}", topic);
            Ok(())
        }
        Command::Lyrics { concept } => {
            let pipeline = build_pipeline(config, store)?;
            stream_lyrics(pipeline.client(), concept.into_concept(), cancel).await
        }
        Command::Cover { id, style } => {
            let mut pipeline = build_pipeline(config, store)?;
            pipeline.load_history()?;
            pipeline.recall(&id)?;
            let item = pipeline
                .regenerate_cover(&CoverStyle::from_input(&style), cancel)
                .await?;
            notice(Notice::Saved, "New cover saved");
            print_song(&item, false);
            Ok(())
        }
        Command::Restyle { id } => {
            let mut pipeline = build_pipeline(config, store)?;
            pipeline.load_history()?;
            pipeline.recall(&id)?;
            pipeline.regenerate_style(cancel).await?;
            let item = pipeline.save_edits()?;
            notice(Notice::Saved, "New style saved");
            print_song(&item, false);
            Ok(())
        }
        Command::Rewrite { id } => {
            let mut pipeline = build_pipeline(config, store)?;
            pipeline.load_history()?;
            pipeline.recall(&id)?;
            let mut echo = LyricsEcho::default();
            pipeline
                .regenerate_lyrics(cancel, |delta| echo.push(delta))
                .await?;
            echo.finish();
            let item = pipeline.save_edits()?;
            notice(Notice::Saved, &format!("New lyrics saved for {}", item.id));
            Ok(())
        }
        Command::Tags { id } => {
            let mut pipeline = build_pipeline(config, store)?;
            pipeline.load_history()?;
            let topic = pipeline.recall(&id)?.concept.topic.clone();
            let tags = pipeline.suggest_style_tags(cancel).await?;
            print_tags(&topic, &tags);
            Ok(())
        }
        Command::List => {
            print_history(&store.list()?);
            Ok(())
        }
        Command::Show {
            id,
            sung_only,
            cover_out,
        } => {
            let item = store
                .get(&id)?
                .ok_or_else(|| PipelineError::UnknownItem(id.clone()))?;
            print_song(&item, sung_only);
            if let Some(path) = cover_out {
                write_cover(&item.cover_url, &path)?;
                notice(Notice::Saved, &format!("Cover written to {:?}", path));
            }
            Ok(())
        }
        Command::Delete { id } => {
            if store.delete(&id)? {
                notice(Notice::Saved, &format!("Deleted {}", id));
            } else {
                notice(Notice::Caution, &format!("No song with id {}", id));
            }
            Ok(())
        }
        Command::Edit {
            id,
            lyrics_file,
            style_prompt,
            story,
        } => edit_song(
            &store,
            &config.limits,
            &id,
            lyrics_file.as_deref(),
            style_prompt,
            story,
        ),
        Command::Export { output } => {
            let blob = store.export_all()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, blob)
                        .with_context(|| format!("Failed to write {:?}", path))?;
                    notice(Notice::Saved, &format!("History exported to {:?}", path));
                }
                None => println!("{}", blob),
            }
            Ok(())
        }
        Command::Import { input } => {
            let blob = std::fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {:?}", input))?;
            let count = store.import_all(&blob)?;
            notice(Notice::Saved, &format!("Imported {} songs", count));
            Ok(())
        }
    }
}

/// Only commands that talk to the provider need an API key.
fn build_pipeline(config: &AppConfig, store: Arc<SqliteHistoryStore>) -> Result<SongPipeline> {
    let gemini_config = config.gemini_config().map_err(PipelineError::from)?;
    let provider = Arc::new(GeminiProvider::new(gemini_config));
    let client = GenerationClient::new(provider, config.client_settings());
    Ok(SongPipeline::new(client, store))
}

// =============================================================================
// Generation commands
// =============================================================================

async fn with_audio_reference(
    client: &GenerationClient,
    concept: SongConcept,
    path: &Path,
    cancel: &CancellationToken,
) -> Result<SongConcept> {
    let audio = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read audio file {:?}", path))?;
    if !infer::is_audio(&audio) {
        notice(Notice::Caution, "The reference does not look like an audio file, sending it anyway");
    }
    let mime_type = infer::get(&audio)
        .map(|kind| kind.mime_type())
        .unwrap_or_default();

    notice(Notice::Working, "Listening to the audio reference...");
    let analysis = tokio::select! {
        _ = cancel.cancelled() => return Err(PipelineError::Cancelled.into()),
        result = client.analyze_audio(&audio, mime_type) => result.map_err(PipelineError::from)?,
    };
    let analysis = analysis.or_fallback();
    Ok(apply_audio_analysis(&concept, &analysis))
}

async fn create_song(
    pipeline: &mut SongPipeline,
    concept: SongConcept,
    variant: Option<u8>,
    cover_style: CoverStyle,
    cancel: &CancellationToken,
) -> Result<()> {
    pipeline.load_history()?;
    notice(Notice::Working, "Writing two lyrics variants and a style prompt...");
    let variants = pipeline.submit_concept(concept, cancel).await?.clone();

    print_concept(&pipeline.working().concept);
    print_variants(&variants);

    let index = match variant {
        Some(v) => usize::from(v) - 1,
        None => ask_variant().await?,
    };

    notice(Notice::Working, "Painting the cover...");
    pipeline.set_cover_style(cover_style);
    let item = match pipeline.choose_variant(index, cancel).await {
        Ok(item) => item,
        // Lyrics and style are kept, only the image step runs again.
        Err(PipelineError::Generation(GenerationError::ArtGeneration(reason))) => {
            notice(Notice::Caution, &format!("Cover failed ({}), retrying...", reason));
            pipeline.retry_cover(cancel).await?
        }
        Err(e) => return Err(e.into()),
    };

    notice(Notice::Saved, &format!("Saved \"{}\" as {}", item.title(), item.id));
    print_song(&item, false);
    Ok(())
}

async fn ask_variant() -> Result<usize> {
    loop {
        ask("Keep variant 1 or 2?");
        let line = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|_| line)
        })
        .await??;
        if line.is_empty() {
            bail!("No variant chosen");
        }
        match line.trim() {
            "1" => return Ok(0),
            "2" => return Ok(1),
            other => notice(Notice::Caution, &format!("\"{}\" is not a variant, enter 1 or 2", other)),
        }
    }
}

async fn stream_lyrics(
    client: &GenerationClient,
    concept: SongConcept,
    cancel: &CancellationToken,
) -> Result<()> {
    if concept.is_blank_topic() {
        bail!("A topic is required to write lyrics");
    }
    let mut stream = client
        .stream_lyrics(&concept)
        .await
        .map_err(PipelineError::from)?;
    let mut echo = LyricsEcho::default();
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled.into()),
            next = stream.next() => next,
        };
        let Some(delta) = next else {
            break;
        };
        let delta = delta.map_err(|e| PipelineError::from(GenerationError::from(e)))?;
        echo.push(&delta);
    }
    echo.finish();
    Ok(())
}

// =============================================================================
// History commands
// =============================================================================

fn edit_song(
    store: &SqliteHistoryStore,
    limits: &GenerationLimits,
    id: &str,
    lyrics_file: Option<&Path>,
    style_prompt: Option<String>,
    story: Option<String>,
) -> Result<()> {
    let mut item = store
        .get(id)?
        .ok_or_else(|| PipelineError::UnknownItem(id.to_string()))?;

    if let Some(path) = lyrics_file {
        let lyrics = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read lyrics file {:?}", path))?;
        item.lyrics = lyrics.trim().to_string();
    }
    if let Some(prompt) = style_prompt {
        item.style.set_prompt(&prompt, limits);
        match item.style.prompt_length(limits) {
            PromptLength::WithinTarget => {}
            PromptLength::OverTarget => notice(Notice::Working, "The style prompt is longer than usual"),
            PromptLength::OverSoft => {
                notice(Notice::Caution, "The style prompt is long, some music models may cut it")
            }
            PromptLength::OverHard => notice(Notice::Caution, &format!(
                "The style prompt was cut to {} characters",
                limits.style_prompt_hard
            )),
        }
    }
    if let Some(story) = story {
        item.style.song_description = story.trim().to_string();
    }

    store.put(&item)?;
    notice(Notice::Saved, &format!("Saved {}", item.id));
    Ok(())
}

fn write_cover(cover_url: &str, path: &Path) -> Result<()> {
    let data = cover_url
        .split_once(";base64,")
        .map(|(_, data)| data)
        .context("Cover is not an inline image")?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .context("Cover data is not valid base64")?;
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {:?}", path))
}

//! Songsmith library
//!
//! Turns a song concept into lyrics, a style prompt and cover artwork using a
//! generative AI provider, and keeps the results in a local history.

pub mod concept;
pub mod config;
pub mod generation;
pub mod history_store;
pub mod pipeline;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use concept::{merge_suggestions, PartialSongConcept, SongConcept, TagField};
pub use generation::{
    GeminiConfig, GeminiProvider, GeneratedStyle, GenerationClient, GenerationError,
    GenerationProvider, Locale, ProviderError,
};
pub use history_store::{HistoryStore, SongHistoryItem, SqliteHistoryStore};
pub use pipeline::{PipelineError, PipelineState, SongPipeline};

mod models;
mod normalizer;

pub use models::{AudioAnalysis, PartialSongConcept, SongConcept, TagField};
pub use normalizer::{apply_audio_analysis, merge_suggestions};

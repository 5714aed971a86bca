//! Concept-to-song pipeline.
//!
//! Topic resolution, attribute suggestion, concurrent lyrics and style
//! generation, variant choice, cover art and persistence.

mod executor;
mod state;

pub use executor::{PipelineError, SongPipeline};
pub use state::{PipelineState, WorkingCopy};

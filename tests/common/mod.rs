//! Common test infrastructure
//!
//! This module provides a scripted generation provider and a pipeline
//! fixture backed by a temporary SQLite history.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::TestPipeline;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::test]
//! async fn test_submit() {
//!     let mut fixture = TestPipeline::new();
//!     let cancel = CancellationToken::new();
//!     fixture.pipeline.submit_concept(Default::default(), &cancel).await.unwrap();
//! }
//! ```

#![allow(dead_code)]

mod constants;
mod fixtures;
mod provider;

// Public API - this is what tests import
pub use constants::*;
pub use fixtures::TestPipeline;
pub use provider::{numbered_lyrics, png, FakeProvider, TextKind};

//! # casegen-core
//!
//! Core types, traits, and abstractions for casegen, the video-to-test-case
//! analysis pipeline.
//!
//! This crate provides the foundational data structures (media assets,
//! transient frames and audio clips, transcripts, interaction events and the
//! synthesized test case) and the storage seam that other casegen crates
//! depend on.
//!
//! ## Structured logging fields
//!
//! All crates log with `tracing` using the same field names: `media_id`,
//! `job_id`, `strategy`, `tool`, `op`, `duration_ms`, `frame_count`,
//! `event_count`, `error`. WARN means an automatic fallback was applied;
//! DEBUG marks decision points such as probe results.

pub mod defaults;
pub mod error;
pub mod models;
pub mod repository;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use repository::InMemoryMediaRepository;
pub use traits::*;

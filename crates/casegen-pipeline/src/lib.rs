//! # casegen-pipeline
//!
//! Turns a screen recording into a structured QA test case.
//!
//! This crate provides:
//! - Pluggable extraction stages (frame sampling, text recognition, audio
//!   extraction, transcription) backed by ffmpeg, tesseract and whisper
//! - Declarative UI action heuristics producing an interaction timeline
//! - An ordered fallback chain of whole-pipeline analysis strategies
//! - Deterministic test case synthesis and result envelope assembly
//! - A background worker driving the media asset state machine
//!
//! ## Example
//!
//! ```ignore
//! use casegen_pipeline::{AnalysisConfig, VideoAnalysisPipeline};
//!
//! let pipeline = VideoAnalysisPipeline::from_config(AnalysisConfig::from_env())?;
//! let envelope = pipeline.run(Path::new("login_flow.mp4"), "login_flow.mp4").await?;
//! println!("{} via {}", envelope.result.title, envelope.strategy);
//! ```

pub mod audio;
pub mod command;
pub mod config;
pub mod envelope;
pub mod frames;
pub mod heuristics;
pub mod ocr;
pub mod pipeline;
pub mod selector;
pub mod strategies;
pub mod synthesizer;
pub mod transcription;
pub mod worker;
pub mod workspace;

// Re-export core types
pub use casegen_core::*;

pub use audio::{AudioExtractor, FfmpegAudioExtractor};
pub use config::AnalysisConfig;
pub use envelope::EnvelopeBuilder;
pub use frames::{FfmpegFrameSampler, FrameSampler};
pub use heuristics::HeuristicsReport;
pub use ocr::{TesseractOcr, TextRecognizer};
pub use pipeline::{PipelineBuilder, ToolReport, ToolStatus, VideoAnalysisPipeline};
pub use selector::AnalyzerChain;
pub use strategies::{AnalysisContext, VideoAnalyzer, VideoSource};
pub use transcription::{
    LocalAiNarrativeBackend, PythonWhisperBackend, Transcriber, TranscriptionBackend,
    WhisperCppBackend,
};
pub use worker::{AnalysisJob, AnalysisWorker, JobQueue, WorkerConfig, WorkerEvent, WorkerHandle};
pub use workspace::Workspace;

//! Whole-pipeline analysis strategies.
//!
//! Each strategy turns the same [`AnalysisContext`] into an
//! [`AnalysisResult`] by a different route. The
//! [`AnalyzerChain`](crate::selector::AnalyzerChain) tries them in order.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::warn;

use casegen_core::{AnalysisResult, Frame, Result};

use crate::frames::FrameSampler;
use crate::workspace::Workspace;

pub mod ai_response;
pub mod filename_heuristic;
pub mod generative;
pub mod ocr_heuristic;
pub mod static_fallback;

pub use filename_heuristic::FilenameHeuristicAnalyzer;
pub use generative::GenerativeAnalyzer;
pub use ocr_heuristic::OcrHeuristicAnalyzer;
pub use static_fallback::StaticFallbackAnalyzer;

/// The recording being analyzed.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSource {
    pub path: PathBuf,
    pub filename: String,
    pub duration_secs: Option<f64>,
    pub size_bytes: u64,
}

/// Per-run state shared by every strategy attempt.
///
/// Frames are sampled lazily on first use and reused by later strategies.
pub struct AnalysisContext {
    pub source: VideoSource,
    workspace: Workspace,
    frame_count: usize,
    sampler: Arc<dyn FrameSampler>,
    frames: OnceCell<Vec<Frame>>,
}

impl AnalysisContext {
    pub fn new(
        source: VideoSource,
        workspace: Workspace,
        frame_count: usize,
        sampler: Arc<dyn FrameSampler>,
    ) -> Self {
        Self {
            source,
            workspace,
            frame_count,
            sampler,
            frames: OnceCell::new(),
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Sampled frames (possibly empty), sampled at most once per run.
    pub async fn frames(&self) -> &[Frame] {
        self.frames
            .get_or_init(|| async {
                match self.workspace.subdir("frames") {
                    Ok(dir) => {
                        self.sampler
                            .sample(
                                &self.source.path,
                                self.source.duration_secs,
                                self.frame_count,
                                &dir,
                            )
                            .await
                    }
                    Err(e) => {
                        warn!(error = %e, "Cannot create frame directory");
                        Vec::new()
                    }
                }
            })
            .await
    }

    /// Give back the workspace so the caller can remove it.
    pub fn into_workspace(self) -> Workspace {
        self.workspace
    }
}

/// One way of producing a test case from a recording.
#[async_trait]
pub trait VideoAnalyzer: Send + Sync {
    /// Stable identifier reported as the envelope's `strategy`.
    fn name(&self) -> &'static str;

    /// Whether the strategy's dependencies are present.
    async fn available(&self, ctx: &AnalysisContext) -> bool;

    /// Produce a (possibly partial) result. Any error means "try the next
    /// strategy".
    async fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalysisResult>;
}

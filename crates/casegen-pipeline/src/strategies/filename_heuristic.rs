//! Filename and duration heuristic. Needs no external tools.

use async_trait::async_trait;

use casegen_core::{AnalysisResult, Result};

use crate::envelope::EnvelopeBuilder;
use crate::heuristics::{merge_events, scan_text, HeuristicsReport};
use crate::synthesizer::{humanize_filename, synthesize, SynthesisInput};

use super::{AnalysisContext, VideoAnalyzer};

pub const FILENAME_HEURISTIC: &str = "filename_heuristic";

/// Reads UI vocabulary out of the filename (`login_flow.mp4` implies a
/// Login click) and sizes priority by duration.
#[derive(Debug, Default)]
pub struct FilenameHeuristicAnalyzer;

#[async_trait]
impl VideoAnalyzer for FilenameHeuristicAnalyzer {
    fn name(&self) -> &'static str {
        FILENAME_HEURISTIC
    }

    async fn available(&self, _ctx: &AnalysisContext) -> bool {
        true
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalysisResult> {
        let words = humanize_filename(&ctx.source.filename);
        let report = HeuristicsReport::from_events(merge_events(scan_text(&words, 0.0, true)));
        let result = synthesize(&SynthesisInput {
            filename: &ctx.source.filename,
            duration_secs: ctx.source.duration_secs,
            report: &report,
            transcript: None,
        });
        Ok(EnvelopeBuilder::new(&ctx.source)
            .with_events(&report.events)
            .complete(result))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{context, FakeSampler};
    use super::*;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_login_filename() {
        let root = tempfile::tempdir().unwrap();
        let sampler = FakeSampler::new(false);
        let ctx = context(root.path(), "login_flow.mp4", sampler.clone());

        let result = FilenameHeuristicAnalyzer.analyze(&ctx).await.unwrap();
        assert!(result.title.contains("Login"));
        assert_eq!(result.steps[0], "Click the Login button");
        assert!(result.expected_results.contains("authenticated"));
        // Never touches the video
        assert_eq!(sampler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_uninformative_filename() {
        let root = tempfile::tempdir().unwrap();
        let ctx = context(root.path(), "VID_0001.mp4", FakeSampler::new(false));
        let result = FilenameHeuristicAnalyzer.analyze(&ctx).await.unwrap();
        assert_eq!(result.title, "VID Test");
        assert_eq!(result.steps.len(), 3);
        assert!(result.steps[2].starts_with("Verify"));
    }
}

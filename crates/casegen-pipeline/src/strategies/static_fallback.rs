//! Terminal strategy: a fixed, always well-formed payload.

use async_trait::async_trait;

use casegen_core::{AnalysisResult, Priority, Result, TestStatus};

use crate::envelope::EnvelopeBuilder;

use super::{AnalysisContext, VideoAnalyzer, VideoSource};

pub const STATIC_FALLBACK: &str = "static_fallback";

/// Placeholder test case for `source`.
pub fn static_result(source: &VideoSource) -> AnalysisResult {
    EnvelopeBuilder::new(source).complete(AnalysisResult {
        priority: Priority::from_duration(source.duration_secs),
        status: TestStatus::Draft,
        ..Default::default()
    })
}

#[derive(Debug, Default)]
pub struct StaticFallbackAnalyzer;

#[async_trait]
impl VideoAnalyzer for StaticFallbackAnalyzer {
    fn name(&self) -> &'static str {
        STATIC_FALLBACK
    }

    async fn available(&self, _ctx: &AnalysisContext) -> bool {
        true
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalysisResult> {
        Ok(static_result(&ctx.source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_static_result_is_complete() {
        let source = VideoSource {
            path: PathBuf::from("/tmp/x.mp4"),
            filename: "x.mp4".into(),
            duration_secs: Some(400.0),
            size_bytes: 1,
        };
        let result = static_result(&source);
        assert!(!result.title.is_empty());
        assert!(!result.description.is_empty());
        assert!(!result.preconditions.is_empty());
        assert!(!result.steps.is_empty());
        assert!(!result.expected_results.is_empty());
        assert_eq!(result.priority, Priority::Critical);
        assert_eq!(result.status, TestStatus::Draft);
    }
}

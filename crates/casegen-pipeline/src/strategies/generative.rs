//! Generative-AI strategies: remote vision service and local endpoint.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use casegen_core::{format_timestamp, AnalysisResult, Error, Priority, Result, TestStatus};
use casegen_inference::{GenerationBackend, GenerationRequest, ImageInput};

use super::ai_response::parse_ai_response;
use super::{AnalysisContext, VideoAnalyzer};

pub const REMOTE_VISION: &str = "remote_vision";
pub const LOCAL_AI: &str = "local_ai";

const SYSTEM_PROMPT: &str = "You are a QA engineer who writes manual test cases from screen \
recordings. Respond with a single JSON object and nothing else.";

/// Sends the sampled frames to a multimodal model and parses the test case
/// it writes.
pub struct GenerativeAnalyzer {
    name: &'static str,
    backend: Arc<dyn GenerationBackend>,
}

impl GenerativeAnalyzer {
    /// Remote vision service (OpenAI-compatible).
    pub fn remote_vision(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            name: REMOTE_VISION,
            backend,
        }
    }

    /// Local generative-AI endpoint (Ollama).
    pub fn local_ai(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            name: LOCAL_AI,
            backend,
        }
    }

    fn prompt(ctx: &AnalysisContext, timestamps: &[f64]) -> String {
        let length = ctx
            .source
            .duration_secs
            .map(format_timestamp)
            .unwrap_or_else(|| "unknown".to_string());
        let at = timestamps
            .iter()
            .map(|t| format_timestamp(*t))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "The attached images are frames sampled at {at} from the screen recording \
             \"{file}\" (length {length}). Describe the workflow the user performs as a \
             manual QA test case. Return JSON with these keys:\n\
             {{\"title\": string, \"summary\": string, \"description\": string, \
             \"preconditions\": string, \"steps\": [string], \"expected_results\": string, \
             \"priority\": \"Critical\" | \"High\" | \"Medium\" | \"Low\"}}",
            at = at,
            file = ctx.source.filename,
            length = length,
        )
    }
}

#[async_trait]
impl VideoAnalyzer for GenerativeAnalyzer {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn available(&self, _ctx: &AnalysisContext) -> bool {
        self.backend.health_check().await.unwrap_or(false)
    }

    #[instrument(skip(self, ctx), fields(strategy = self.name, model = self.backend.model_name()))]
    async fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalysisResult> {
        let start = Instant::now();
        let frames = ctx.frames().await;
        if frames.is_empty() {
            return Err(Error::ToolUnavailable("no frames could be sampled".into()));
        }

        let mut images = Vec::with_capacity(frames.len());
        for frame in frames {
            images.push(ImageInput::jpeg(tokio::fs::read(&frame.path).await?));
        }
        let timestamps: Vec<f64> = frames.iter().map(|f| f.timestamp_secs).collect();

        let request = GenerationRequest::new(Self::prompt(ctx, &timestamps))
            .with_system(SYSTEM_PROMPT)
            .with_images(images);
        let response = self.backend.generate(&request).await?;
        debug!(response_len = response.len(), "Model responded");

        let parsed = parse_ai_response(&response)?;
        info!(
            frame_count = frames.len(),
            step_count = parsed.steps.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Generated test case"
        );

        Ok(AnalysisResult {
            title: parsed.title,
            summary: parsed.summary,
            description: parsed.description,
            preconditions: parsed.preconditions,
            steps: parsed.steps,
            expected_results: parsed.expected_results,
            priority: parsed
                .priority
                .unwrap_or_else(|| Priority::from_duration(ctx.source.duration_secs)),
            status: TestStatus::Draft,
            video_source: ctx.source.filename.clone(),
            ..Default::default()
        })
    }
}

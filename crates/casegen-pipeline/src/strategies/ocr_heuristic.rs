//! OCR plus heuristics strategy.
//!
//! Recognizes text in every sampled frame, transcribes the audio track when
//! there is one, and runs the pattern tables over both.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use casegen_core::defaults::{STRATEGY_RESERVE_PERCENT, STRATEGY_TIMEOUT_SECS};
use casegen_core::{AnalysisResult, Error, Result};

use crate::audio::AudioExtractor;
use crate::envelope::EnvelopeBuilder;
use crate::heuristics::build_report;
use crate::ocr::{recognize_frames, TextRecognizer};
use crate::synthesizer::{synthesize, SynthesisInput};
use crate::transcription::Transcriber;

use super::{AnalysisContext, VideoAnalyzer};

pub const OCR_HEURISTIC: &str = "ocr_heuristic";

/// Time the inner stages may use out of a strategy timeout.
pub fn stage_budget(strategy_timeout: Duration) -> Duration {
    strategy_timeout * (100 - STRATEGY_RESERVE_PERCENT as u32) / 100
}

pub struct OcrHeuristicAnalyzer {
    recognizer: Arc<dyn TextRecognizer>,
    audio: Arc<dyn AudioExtractor>,
    transcriber: Transcriber,
    /// Audio extraction and transcription must finish within this span of
    /// the analysis start; past it the run continues without speech.
    stage_budget: Duration,
}

impl OcrHeuristicAnalyzer {
    pub fn new(
        recognizer: Arc<dyn TextRecognizer>,
        audio: Arc<dyn AudioExtractor>,
        transcriber: Transcriber,
    ) -> Self {
        Self {
            recognizer,
            audio,
            transcriber,
            stage_budget: stage_budget(Duration::from_secs(STRATEGY_TIMEOUT_SECS)),
        }
    }

    /// Fit the audio stages inside `strategy_timeout`.
    pub fn with_strategy_timeout(mut self, strategy_timeout: Duration) -> Self {
        self.stage_budget = stage_budget(strategy_timeout);
        self
    }
}

#[async_trait]
impl VideoAnalyzer for OcrHeuristicAnalyzer {
    fn name(&self) -> &'static str {
        OCR_HEURISTIC
    }

    async fn available(&self, _ctx: &AnalysisContext) -> bool {
        self.recognizer.available().await
    }

    #[instrument(skip(self, ctx), fields(strategy = OCR_HEURISTIC))]
    async fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalysisResult> {
        let start = Instant::now();
        let deadline = tokio::time::Instant::now() + self.stage_budget;
        let frames = ctx.frames().await;
        if frames.is_empty() {
            return Err(Error::ToolUnavailable("no frames could be sampled".into()));
        }

        let frames = recognize_frames(self.recognizer.clone(), frames).await;

        let audio_dir = ctx.workspace().subdir("audio")?;
        let extract = self
            .audio
            .extract(&ctx.source.path, ctx.source.duration_secs, &audio_dir);
        let clip = match tokio::time::timeout_at(deadline, extract).await {
            Ok(clip) => clip,
            Err(_) => {
                warn!("Audio extraction exceeded the strategy budget, continuing without audio");
                None
            }
        };
        let transcript = match clip {
            Some(clip) => Some(
                self.transcriber
                    .transcribe_until(&clip, &audio_dir, deadline)
                    .await,
            ),
            None => None,
        };

        let report = build_report(&frames, transcript.as_ref());
        let result = synthesize(&SynthesisInput {
            filename: &ctx.source.filename,
            duration_secs: ctx.source.duration_secs,
            report: &report,
            transcript: transcript.as_ref(),
        });

        info!(
            frame_count = frames.len(),
            event_count = report.events.len(),
            transcript = transcript.as_ref().map(|t| t.source.to_string()),
            duration_ms = start.elapsed().as_millis() as u64,
            "Heuristic analysis complete"
        );

        Ok(EnvelopeBuilder::new(&ctx.source)
            .with_events(&report.events)
            .with_transcript(transcript.as_ref())
            .complete(result))
    }
}

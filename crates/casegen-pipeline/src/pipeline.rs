//! End-to-end analysis of one recording.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use casegen_core::{AnalysisEnvelope, Error, Result};
use casegen_inference::{GenerationBackend, OllamaBackend, OpenAIVisionBackend};

use crate::audio::{AudioExtractor, FfmpegAudioExtractor};
use crate::command::ToolProbe;
use crate::config::AnalysisConfig;
use crate::envelope::EnvelopeBuilder;
use crate::frames::{FfmpegFrameSampler, FrameSampler};
use crate::ocr::{TesseractOcr, TextRecognizer};
use crate::selector::AnalyzerChain;
use crate::strategies::{
    AnalysisContext, FilenameHeuristicAnalyzer, GenerativeAnalyzer, OcrHeuristicAnalyzer,
    StaticFallbackAnalyzer, VideoAnalyzer, VideoSource,
};
use crate::transcription::{
    LocalAiNarrativeBackend, PythonWhisperBackend, Transcriber, TranscriptionBackend,
    WhisperCppBackend,
};
use crate::workspace::Workspace;

/// Availability of one external dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolStatus {
    pub name: String,
    /// Pipeline stage the tool serves (e.g. "frames", "ocr", "transcription").
    pub stage: String,
    pub available: bool,
}

/// Availability of every external dependency plus the strategy order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolReport {
    pub tools: Vec<ToolStatus>,
    pub strategies: Vec<String>,
}

/// Assembles a [`VideoAnalysisPipeline`], defaulting every stage to the
/// subprocess/HTTP implementation described by the [`AnalysisConfig`].
pub struct PipelineBuilder {
    config: AnalysisConfig,
    sampler: Option<Arc<dyn FrameSampler>>,
    recognizer: Option<Arc<dyn TextRecognizer>>,
    audio: Option<Arc<dyn AudioExtractor>>,
    transcription: Option<Vec<Arc<dyn TranscriptionBackend>>>,
    local_ai: Option<Arc<dyn GenerationBackend>>,
    remote_vision: Option<Arc<dyn GenerationBackend>>,
}

impl PipelineBuilder {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            sampler: None,
            recognizer: None,
            audio: None,
            transcription: None,
            local_ai: None,
            remote_vision: None,
        }
    }

    pub fn with_frame_sampler(mut self, sampler: Arc<dyn FrameSampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    pub fn with_recognizer(mut self, recognizer: Arc<dyn TextRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn with_audio_extractor(mut self, audio: Arc<dyn AudioExtractor>) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Replace the speech-to-text cascade (order is preserved).
    pub fn with_transcription_backends(mut self, backends: Vec<Arc<dyn TranscriptionBackend>>) -> Self {
        self.transcription = Some(backends);
        self
    }

    /// Replace the local generative-AI backend.
    pub fn with_local_ai(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.local_ai = Some(backend);
        self
    }

    /// Enable the remote vision strategy with `backend`, regardless of
    /// whether the config carries a credential.
    pub fn with_remote_vision(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.remote_vision = Some(backend);
        self
    }

    pub fn build(self) -> Result<VideoAnalysisPipeline> {
        let config = self.config;
        let timeout = config.cmd_timeout_secs;

        let sampler = self.sampler.unwrap_or_else(|| {
            Arc::new(FfmpegFrameSampler::new(
                &config.ffmpeg_bin,
                &config.ffprobe_bin,
                timeout,
            ))
        });
        let recognizer = self.recognizer.unwrap_or_else(|| {
            Arc::new(TesseractOcr::new(
                &config.tesseract_bin,
                &config.tesseract_lang,
                timeout,
            ))
        });
        let audio = self
            .audio
            .unwrap_or_else(|| Arc::new(FfmpegAudioExtractor::new(&config.ffmpeg_bin, timeout)));
        let local_ai: Arc<dyn GenerationBackend> = self
            .local_ai
            .unwrap_or_else(|| Arc::new(OllamaBackend::new(config.ollama.clone())));
        let transcription = self.transcription.unwrap_or_else(|| {
            vec![
                Arc::new(WhisperCppBackend::new(
                    &config.whisper_cpp_bin,
                    config.whisper_cpp_model.clone(),
                    timeout,
                )),
                Arc::new(PythonWhisperBackend::new(
                    &config.python_bin,
                    &config.whisper_py_model,
                    timeout,
                )),
                Arc::new(LocalAiNarrativeBackend::new(local_ai.clone())),
            ]
        });
        let remote_vision: Option<Arc<dyn GenerationBackend>> = match self.remote_vision {
            Some(backend) => Some(backend),
            None if config.vision_enabled() => {
                Some(Arc::new(OpenAIVisionBackend::new(config.vision.clone())?))
            }
            None => None,
        };

        let transcriber = Transcriber::new(transcription);

        let mut analyzers: Vec<Arc<dyn VideoAnalyzer>> = Vec::new();
        if let Some(backend) = &remote_vision {
            analyzers.push(Arc::new(GenerativeAnalyzer::remote_vision(backend.clone())));
        }
        analyzers.push(Arc::new(GenerativeAnalyzer::local_ai(local_ai.clone())));
        analyzers.push(Arc::new(
            OcrHeuristicAnalyzer::new(recognizer.clone(), audio.clone(), transcriber.clone())
                .with_strategy_timeout(Duration::from_secs(config.strategy_timeout_secs)),
        ));
        analyzers.push(Arc::new(FilenameHeuristicAnalyzer));
        analyzers.push(Arc::new(StaticFallbackAnalyzer));

        let chain = AnalyzerChain::new(analyzers, Duration::from_secs(config.strategy_timeout_secs));
        let ffprobe = ToolProbe::new(config.ffprobe_bin.clone(), &["-version"]);

        info!(
            strategies = ?chain.names(),
            frame_count = config.frame_count,
            "Analysis pipeline configured"
        );

        Ok(VideoAnalysisPipeline {
            config,
            sampler,
            recognizer,
            audio,
            transcriber,
            local_ai,
            remote_vision,
            ffprobe,
            chain,
        })
    }
}

/// The video-to-test-case pipeline.
///
/// Stateless across runs: every [`run`](Self::run) gets its own workspace,
/// so one pipeline can serve concurrent jobs.
pub struct VideoAnalysisPipeline {
    config: AnalysisConfig,
    sampler: Arc<dyn FrameSampler>,
    recognizer: Arc<dyn TextRecognizer>,
    audio: Arc<dyn AudioExtractor>,
    transcriber: Transcriber,
    local_ai: Arc<dyn GenerationBackend>,
    remote_vision: Option<Arc<dyn GenerationBackend>>,
    ffprobe: ToolProbe,
    chain: AnalyzerChain,
}

impl VideoAnalysisPipeline {
    /// Pipeline with every stage backed by the configured tools.
    pub fn from_config(config: AnalysisConfig) -> Result<Self> {
        PipelineBuilder::new(config).build()
    }

    pub fn builder(config: AnalysisConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Strategy names in attempt order.
    pub fn strategies(&self) -> Vec<&'static str> {
        self.chain.names()
    }

    /// Analyze `video`, reporting it as `filename` (the file name of `video`
    /// when empty).
    ///
    /// Fails only with [`Error::InvalidInput`] (missing, unreadable or empty
    /// file) or [`Error::Unrecoverable`] (no workspace). Every other failure
    /// degrades to a later strategy.
    #[instrument(skip(self, video), fields(filename = %filename))]
    pub async fn run(&self, video: &Path, filename: &str) -> Result<AnalysisEnvelope> {
        let start = Instant::now();
        let mut source = validate_input(video, filename).await?;

        let workspace = Workspace::create(self.config.workspace_root.as_deref())?;
        source.duration_secs = self.sampler.probe_duration(video).await;

        let ctx = AnalysisContext::new(
            source,
            workspace,
            self.config.frame_count,
            self.sampler.clone(),
        );
        let (result, strategy) = self.chain.run(&ctx).await;
        let envelope = EnvelopeBuilder::new(&ctx.source).build(result, &strategy);
        ctx.into_workspace().close();

        info!(
            strategy = %envelope.strategy,
            step_count = envelope.result.steps.len(),
            priority = %envelope.result.priority,
            duration_ms = start.elapsed().as_millis() as u64,
            "Video analyzed"
        );
        Ok(envelope)
    }

    /// Probe every external dependency.
    pub async fn tool_report(&self) -> ToolReport {
        let mut tools = vec![
            status(self.sampler.name(), "frames", self.sampler.available().await),
            status(self.ffprobe.bin(), "duration", self.ffprobe.is_available().await),
            status(self.recognizer.name(), "ocr", self.recognizer.available().await),
            status(self.audio.name(), "audio", self.audio.available().await),
        ];
        for backend in self.transcriber.backends() {
            tools.push(status(backend.name(), "transcription", backend.available().await));
        }
        tools.push(status(
            self.local_ai.model_name(),
            "local_ai",
            self.local_ai.health_check().await.unwrap_or(false),
        ));
        if let Some(vision) = &self.remote_vision {
            tools.push(status(
                vision.model_name(),
                "remote_vision",
                vision.health_check().await.unwrap_or(false),
            ));
        }

        ToolReport {
            tools,
            strategies: self.strategies().into_iter().map(String::from).collect(),
        }
    }
}

fn status(name: &str, stage: &str, available: bool) -> ToolStatus {
    ToolStatus {
        name: name.to_string(),
        stage: stage.to_string(),
        available,
    }
}

/// Check that `video` is a readable, non-empty file.
async fn validate_input(video: &Path, filename: &str) -> Result<VideoSource> {
    let metadata = tokio::fs::metadata(video).await.map_err(|e| {
        Error::InvalidInput(format!("Video {} is not accessible: {}", video.display(), e))
    })?;
    if !metadata.is_file() {
        return Err(Error::InvalidInput(format!(
            "Video {} is not a file",
            video.display()
        )));
    }
    if metadata.len() == 0 {
        return Err(Error::InvalidInput(format!(
            "Video {} is empty",
            video.display()
        )));
    }
    tokio::fs::File::open(video).await.map_err(|e| {
        Error::InvalidInput(format!("Video {} is unreadable: {}", video.display(), e))
    })?;

    let filename = match filename.trim() {
        "" => video
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        name => name.to_string(),
    };

    Ok(VideoSource {
        path: video.to_path_buf(),
        filename,
        duration_secs: None,
        size_bytes: metadata.len(),
    })
}

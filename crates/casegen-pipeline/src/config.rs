//! Analysis configuration.

use std::path::PathBuf;

use casegen_core::defaults;
use casegen_inference::{OllamaConfig, OpenAIVisionConfig};

/// Everything a pipeline run needs to know about its environment.
///
/// External tools are addressed by binary name or path and invoked with
/// argument vectors; a binary that cannot be spawned is simply unavailable.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Number of frames sampled per video, always within
    /// `FRAME_COUNT_MIN..=FRAME_COUNT_MAX`.
    pub frame_count: usize,
    /// Timeout for a single external command.
    pub cmd_timeout_secs: u64,
    /// Timeout for one whole strategy attempt.
    pub strategy_timeout_secs: u64,
    /// Parent directory for per-run workspaces (system temp dir when `None`).
    pub workspace_root: Option<PathBuf>,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub tesseract_bin: String,
    pub tesseract_lang: String,
    pub whisper_cpp_bin: String,
    /// whisper.cpp model file; the backend is unavailable without one.
    pub whisper_cpp_model: Option<PathBuf>,
    pub python_bin: String,
    pub whisper_py_model: String,
    /// Local generative-AI endpoint.
    pub ollama: OllamaConfig,
    /// Remote vision service; only consulted when it carries an API key.
    pub vision: OpenAIVisionConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            frame_count: defaults::FRAME_COUNT,
            cmd_timeout_secs: defaults::CMD_TIMEOUT_SECS,
            strategy_timeout_secs: defaults::STRATEGY_TIMEOUT_SECS,
            workspace_root: None,
            ffmpeg_bin: defaults::FFMPEG_BIN.to_string(),
            ffprobe_bin: defaults::FFPROBE_BIN.to_string(),
            tesseract_bin: defaults::TESSERACT_BIN.to_string(),
            tesseract_lang: defaults::TESSERACT_LANG.to_string(),
            whisper_cpp_bin: defaults::WHISPER_CPP_BIN.to_string(),
            whisper_cpp_model: None,
            python_bin: defaults::PYTHON_BIN.to_string(),
            whisper_py_model: defaults::WHISPER_PY_MODEL.to_string(),
            ollama: OllamaConfig::default(),
            vision: OpenAIVisionConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `CASEGEN_FRAME_COUNT` | `4` | Frames sampled per video (clamped to 3..=5) |
    /// | `CASEGEN_CMD_TIMEOUT_SECS` | `60` | Per-command timeout |
    /// | `CASEGEN_STRATEGY_TIMEOUT_SECS` | `240` | Per-strategy timeout |
    /// | `CASEGEN_WORKSPACE_ROOT` | system temp | Parent of run workspaces |
    /// | `FFMPEG_BIN` / `FFPROBE_BIN` | `ffmpeg` / `ffprobe` | Video tools |
    /// | `TESSERACT_BIN` / `TESSERACT_LANG` | `tesseract` / `eng` | OCR |
    /// | `WHISPER_CPP_BIN` / `WHISPER_CPP_MODEL` | `whisper-cli` / unset | Native speech-to-text |
    /// | `PYTHON_BIN` / `WHISPER_PY_MODEL` | `python3` / `base` | Scripted speech-to-text |
    ///
    /// Inference endpoints read their own variables, see [`OllamaConfig::from_env`]
    /// and [`OpenAIVisionConfig::from_env`].
    pub fn from_env() -> Self {
        let string_var = |name: &str, default: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let u64_var = |name: &str, default: u64| {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(default)
        };

        let frame_count = std::env::var("CASEGEN_FRAME_COUNT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::FRAME_COUNT);

        Self {
            frame_count: clamp_frame_count(frame_count),
            cmd_timeout_secs: u64_var("CASEGEN_CMD_TIMEOUT_SECS", defaults::CMD_TIMEOUT_SECS),
            strategy_timeout_secs: u64_var(
                "CASEGEN_STRATEGY_TIMEOUT_SECS",
                defaults::STRATEGY_TIMEOUT_SECS,
            ),
            workspace_root: std::env::var("CASEGEN_WORKSPACE_ROOT")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            ffmpeg_bin: string_var("FFMPEG_BIN", defaults::FFMPEG_BIN),
            ffprobe_bin: string_var("FFPROBE_BIN", defaults::FFPROBE_BIN),
            tesseract_bin: string_var("TESSERACT_BIN", defaults::TESSERACT_BIN),
            tesseract_lang: string_var("TESSERACT_LANG", defaults::TESSERACT_LANG),
            whisper_cpp_bin: string_var("WHISPER_CPP_BIN", defaults::WHISPER_CPP_BIN),
            whisper_cpp_model: std::env::var("WHISPER_CPP_MODEL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            python_bin: string_var("PYTHON_BIN", defaults::PYTHON_BIN),
            whisper_py_model: string_var("WHISPER_PY_MODEL", defaults::WHISPER_PY_MODEL),
            ollama: OllamaConfig::from_env(),
            vision: OpenAIVisionConfig::from_env(),
        }
    }

    /// Set the sampled frame count (clamped).
    pub fn with_frame_count(mut self, count: usize) -> Self {
        self.frame_count = clamp_frame_count(count);
        self
    }

    /// Set the per-command timeout.
    pub fn with_cmd_timeout(mut self, secs: u64) -> Self {
        self.cmd_timeout_secs = secs;
        self
    }

    /// Set the per-strategy timeout.
    pub fn with_strategy_timeout(mut self, secs: u64) -> Self {
        self.strategy_timeout_secs = secs;
        self
    }

    /// Place run workspaces under `root`.
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    /// Point every external binary at `bin`. Tests use a nonexistent path to
    /// simulate a host with no tools installed.
    pub fn with_all_tools(mut self, bin: &str) -> Self {
        self.ffmpeg_bin = bin.to_string();
        self.ffprobe_bin = bin.to_string();
        self.tesseract_bin = bin.to_string();
        self.whisper_cpp_bin = bin.to_string();
        self.python_bin = bin.to_string();
        self
    }

    /// Replace the local generative-AI endpoint config.
    pub fn with_ollama(mut self, ollama: OllamaConfig) -> Self {
        self.ollama = ollama;
        self
    }

    /// Replace the remote vision config.
    pub fn with_vision(mut self, vision: OpenAIVisionConfig) -> Self {
        self.vision = vision;
        self
    }

    /// Whether the remote vision strategy is configured at all.
    pub fn vision_enabled(&self) -> bool {
        self.vision.api_key.is_some()
    }
}

/// Clamp a requested frame count into the supported range.
pub fn clamp_frame_count(count: usize) -> usize {
    count.clamp(defaults::FRAME_COUNT_MIN, defaults::FRAME_COUNT_MAX)
}

//! Centralized default constants for casegen.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// FRAME SAMPLING
// =============================================================================

/// Default number of frames sampled per video.
pub const FRAME_COUNT: usize = 4;

/// Lower bound for the sampled frame count.
pub const FRAME_COUNT_MIN: usize = 3;

/// Upper bound for the sampled frame count.
pub const FRAME_COUNT_MAX: usize = 5;

// =============================================================================
// AUDIO
// =============================================================================

/// Sample rate of the extracted audio track (whisper standard).
pub const AUDIO_SAMPLE_RATE: u32 = 16_000;

/// Channel count of the extracted audio track.
pub const AUDIO_CHANNELS: u32 = 1;

/// Transcript text used when audio exists but no speech backend produced text.
pub const AUDIO_PLACEHOLDER_TRANSCRIPT: &str = "Audio content detected";

// =============================================================================
// EXTERNAL TOOLS
// =============================================================================

/// Timeout for a single external command in seconds.
pub const CMD_TIMEOUT_SECS: u64 = 60;

/// Timeout for availability probes (`--version` style invocations) in seconds.
pub const PROBE_TIMEOUT_SECS: u64 = 5;

/// Timeout for one whole strategy attempt in seconds.
pub const STRATEGY_TIMEOUT_SECS: u64 = 240;

/// Share of a strategy's timeout (percent) held back from its inner stages
/// so a slow stage degrades instead of timing out the whole strategy.
pub const STRATEGY_RESERVE_PERCENT: u64 = 10;

/// Default ffmpeg binary.
pub const FFMPEG_BIN: &str = "ffmpeg";

/// Default ffprobe binary.
pub const FFPROBE_BIN: &str = "ffprobe";

/// Default tesseract binary.
pub const TESSERACT_BIN: &str = "tesseract";

/// Default tesseract language.
pub const TESSERACT_LANG: &str = "eng";

/// Default whisper.cpp binary.
pub const WHISPER_CPP_BIN: &str = "whisper-cli";

/// Default Python interpreter used for the scripted speech model.
pub const PYTHON_BIN: &str = "python3";

/// Default model size for the Python `whisper` package.
pub const WHISPER_PY_MODEL: &str = "base";

/// Prefix of per-run workspace directories.
pub const WORKSPACE_PREFIX: &str = "casegen-";

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default generation model name (Ollama).
pub const GEN_MODEL: &str = "llava:7b";

/// Timeout for generation requests in seconds.
pub const GEN_TIMEOUT_SECS: u64 = 120;

/// Timeout for reachability checks in seconds.
pub const HEALTH_TIMEOUT_SECS: u64 = 5;

/// Default OpenAI-compatible API base URL.
pub const OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default remote vision model.
pub const OPENAI_VISION_MODEL: &str = "gpt-4o-mini";

/// Timeout for remote vision requests in seconds.
pub const OPENAI_TIMEOUT_SECS: u64 = 120;

/// Environment variable holding the remote vision credential.
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

// =============================================================================
// PRIORITY
// =============================================================================

/// Recordings at or above this length (seconds) are High priority.
pub const PRIORITY_HIGH_MIN_SECS: f64 = 60.0;

/// Recordings above this length (seconds) are Critical priority.
pub const PRIORITY_CRITICAL_ABOVE_SECS: f64 = 180.0;

// =============================================================================
// JOB PROCESSING
// =============================================================================

/// Default maximum concurrent analysis jobs.
pub const JOB_MAX_CONCURRENT: usize = 4;

/// Default timeout for a whole analysis job in seconds.
pub const JOB_TIMEOUT_SECS: u64 = 900;

/// Capacity of the job queue.
pub const JOB_QUEUE_CAPACITY: usize = 64;

/// Default event bus broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Maximum accepted upload size in bytes (1 GB).
pub const MAX_UPLOAD_BYTES: usize = 1024 * 1024 * 1024;

/// Default directory for uploaded media.
pub const MEDIA_STORAGE_DIR: &str = "./media";

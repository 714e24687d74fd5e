//! Audio track extraction.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, warn};

use casegen_core::{defaults, AudioClip};

use crate::command::{run_cmd_status, tool_command, ToolProbe};

/// Size of a canonical WAV header; anything this small carries no samples.
const WAV_HEADER_BYTES: u64 = 44;

/// Extracts the audio track of a video as mono 16 kHz PCM.
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    fn name(&self) -> &str;

    async fn available(&self) -> bool;

    /// Extract audio into `out_dir`. `None` when the video has no audio
    /// track or the tooling is missing.
    async fn extract(&self, video: &Path, duration_secs: Option<f64>, out_dir: &Path) -> Option<AudioClip>;
}

/// `ffmpeg -i <video> -vn -acodec pcm_s16le -ar 16000 -ac 1 audio.wav`.
pub struct FfmpegAudioExtractor {
    probe: ToolProbe,
    timeout_secs: u64,
}

impl FfmpegAudioExtractor {
    pub fn new(ffmpeg_bin: &str, timeout_secs: u64) -> Self {
        Self {
            probe: ToolProbe::new(ffmpeg_bin, &["-version"]),
            timeout_secs,
        }
    }
}

#[async_trait]
impl AudioExtractor for FfmpegAudioExtractor {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn available(&self) -> bool {
        self.probe.is_available().await
    }

    async fn extract(&self, video: &Path, duration_secs: Option<f64>, out_dir: &Path) -> Option<AudioClip> {
        if !self.probe.is_available().await {
            warn!(tool = "ffmpeg", "ffmpeg unavailable, skipping audio");
            return None;
        }

        let audio_path = out_dir.join("audio.wav");
        let mut cmd = tool_command(self.probe.bin());
        cmd.arg("-hide_banner")
            .arg("-i")
            .arg(video)
            .arg("-vn")
            .arg("-acodec")
            .arg("pcm_s16le")
            .arg("-ar")
            .arg(defaults::AUDIO_SAMPLE_RATE.to_string())
            .arg("-ac")
            .arg(defaults::AUDIO_CHANNELS.to_string())
            .arg("-y")
            .arg(&audio_path);

        // ffmpeg exits non-zero when the input has no audio stream.
        if let Err(e) = run_cmd_status(&mut cmd, "ffmpeg", self.timeout_secs * 2).await {
            debug!(tool = "ffmpeg", error = %e, "No audio extracted");
            return None;
        }

        match tokio::fs::metadata(&audio_path).await {
            Ok(meta) if meta.len() > WAV_HEADER_BYTES => {
                debug!(tool = "ffmpeg", bytes = meta.len(), "Audio track extracted");
                Some(AudioClip {
                    path: audio_path,
                    duration_secs,
                    sample_rate: defaults::AUDIO_SAMPLE_RATE,
                })
            }
            _ => None,
        }
    }
}

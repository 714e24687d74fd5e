//! Frame sampling with ffmpeg.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use casegen_core::Frame;

use crate::command::{run_cmd_output, run_cmd_with_timeout, tool_command, ToolProbe};

/// Extracts a small set of still images from a video.
#[async_trait]
pub trait FrameSampler: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the sampler's tooling is present.
    async fn available(&self) -> bool;

    /// Duration of the video in seconds, if it can be determined.
    async fn probe_duration(&self, video: &Path) -> Option<f64>;

    /// Sample up to `count` frames into `out_dir`.
    ///
    /// Never fails: missing tooling or an undecodable video yields an empty
    /// set, which strategies treat as "skip".
    async fn sample(
        &self,
        video: &Path,
        duration_secs: Option<f64>,
        count: usize,
        out_dir: &Path,
    ) -> Vec<Frame>;
}

/// Midpoints of `count` equal segments of `[0, duration]`.
///
/// Unknown or non-positive durations fall back to one frame per second from
/// the start.
pub fn sample_timestamps(duration_secs: Option<f64>, count: usize) -> Vec<f64> {
    match duration_secs {
        Some(d) if d.is_finite() && d > 0.0 => {
            let step = d / count as f64;
            (0..count).map(|i| (i as f64 + 0.5) * step).collect()
        }
        _ => (0..count).map(|i| i as f64).collect(),
    }
}

/// Parse timestamps from FFmpeg showinfo filter output.
///
/// Looks for lines like: `[Parsed_showinfo_1 ...] n:   0 pts:   1234 pts_time:1.234`
pub fn parse_showinfo_timestamps(stderr: &str) -> Vec<f64> {
    let mut timestamps = Vec::new();
    for line in stderr.lines() {
        if let Some(pos) = line.find("pts_time:") {
            let after = &line[pos + 9..];
            let value_str: String = after
                .trim_start()
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            if let Ok(ts) = value_str.parse::<f64>() {
                timestamps.push(ts);
            }
        }
    }
    timestamps
}

/// ffmpeg/ffprobe-backed sampler.
pub struct FfmpegFrameSampler {
    ffmpeg: ToolProbe,
    ffprobe: ToolProbe,
    timeout_secs: u64,
}

impl FfmpegFrameSampler {
    pub fn new(ffmpeg_bin: &str, ffprobe_bin: &str, timeout_secs: u64) -> Self {
        Self {
            ffmpeg: ToolProbe::new(ffmpeg_bin, &["-version"]),
            ffprobe: ToolProbe::new(ffprobe_bin, &["-version"]),
            timeout_secs,
        }
    }

    /// Whether ffprobe specifically is present.
    pub async fn ffprobe_available(&self) -> bool {
        self.ffprobe.is_available().await
    }

    async fn collect_frames(out_dir: &Path) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        let mut entries = match tokio::fs::read_dir(out_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Failed to read frame directory");
                return paths;
            }
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("jpg") {
                paths.push(path);
            }
        }
        paths.sort();
        paths
    }
}

#[async_trait]
impl FrameSampler for FfmpegFrameSampler {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn available(&self) -> bool {
        self.ffmpeg.is_available().await
    }

    async fn probe_duration(&self, video: &Path) -> Option<f64> {
        if !self.ffprobe.is_available().await {
            return None;
        }
        let mut cmd = tool_command(self.ffprobe.bin());
        cmd.args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(video);

        match run_cmd_with_timeout(&mut cmd, "ffprobe", self.timeout_secs).await {
            Ok(out) => {
                let duration = out.trim().parse::<f64>().ok().filter(|d| d.is_finite() && *d > 0.0);
                debug!(tool = "ffprobe", ?duration, "Probed duration");
                duration
            }
            Err(e) => {
                warn!(tool = "ffprobe", error = %e, "Duration probe failed");
                None
            }
        }
    }

    #[instrument(skip(self, video, out_dir), fields(tool = "ffmpeg", op = "sample_frames"))]
    async fn sample(
        &self,
        video: &Path,
        duration_secs: Option<f64>,
        count: usize,
        out_dir: &Path,
    ) -> Vec<Frame> {
        if count == 0 {
            return Vec::new();
        }
        if !self.ffmpeg.is_available().await {
            warn!("ffmpeg unavailable, no frames sampled");
            return Vec::new();
        }

        let planned = sample_timestamps(duration_secs, count);
        // Seek to the first midpoint, then emit one frame per segment.
        let (offset, filter) = match duration_secs {
            Some(d) if d.is_finite() && d > 0.0 => {
                (planned[0], format!("fps={}/{},showinfo", count, d))
            }
            _ => (0.0, "fps=1,showinfo".to_string()),
        };

        let pattern = out_dir.join("frame_%04d.jpg");
        let mut cmd = tool_command(self.ffmpeg.bin());
        cmd.arg("-hide_banner")
            .arg("-ss")
            .arg(format!("{:.3}", offset))
            .arg("-i")
            .arg(video)
            .arg("-vf")
            .arg(&filter)
            .arg("-frames:v")
            .arg(count.to_string())
            .arg("-vsync")
            .arg("vfr")
            .arg("-q:v")
            .arg("2")
            .arg("-y")
            .arg(&pattern);

        let output = match run_cmd_output(&mut cmd, "ffmpeg", self.timeout_secs).await {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "Frame extraction failed");
                return Vec::new();
            }
        };
        if !output.status.success() {
            warn!(status = %output.status, "ffmpeg exited with failure while sampling frames");
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let reported = parse_showinfo_timestamps(&stderr);

        let frames: Vec<Frame> = Self::collect_frames(out_dir)
            .await
            .into_iter()
            .take(count)
            .enumerate()
            .map(|(i, path)| {
                let timestamp_secs = reported
                    .get(i)
                    .map(|t| t + offset)
                    .or_else(|| planned.get(i).copied())
                    .unwrap_or(i as f64);
                Frame {
                    timestamp_secs,
                    path,
                    text: None,
                }
            })
            .collect();

        debug!(frame_count = frames.len(), "Frames sampled");
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_timestamps_midpoints() {
        assert_eq!(sample_timestamps(Some(40.0), 4), vec![5.0, 15.0, 25.0, 35.0]);
        assert_eq!(sample_timestamps(Some(3.0), 3), vec![0.5, 1.5, 2.5]);
    }

    #[test]
    fn test_sample_timestamps_unknown_duration() {
        assert_eq!(sample_timestamps(None, 3), vec![0.0, 1.0, 2.0]);
        assert_eq!(sample_timestamps(Some(0.0), 3), vec![0.0, 1.0, 2.0]);
        assert_eq!(sample_timestamps(Some(f64::NAN), 3), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_sample_timestamps_non_decreasing() {
        let ts = sample_timestamps(Some(97.3), 5);
        assert!(ts.windows(2).all(|w| w[0] <= w[1]));
        assert!(ts.iter().all(|t| *t >= 0.0 && *t <= 97.3));
    }

    #[test]
    fn test_parse_showinfo_timestamps() {
        let stderr = "\
[Parsed_showinfo_1 @ 0x5] n:   0 pts:      0 pts_time:0       duration: 1
[Parsed_showinfo_1 @ 0x5] n:   1 pts:  12800 pts_time:10.5    duration: 1
frame=    2 fps=0.0 q=2.0 size=N/A time=00:00:10.50
[Parsed_showinfo_1 @ 0x5] n:   2 pts:  25600 pts_time: 21     duration: 1";
        assert_eq!(parse_showinfo_timestamps(stderr), vec![0.0, 10.5, 21.0]);
    }

    #[test]
    fn test_parse_showinfo_no_matches() {
        assert!(parse_showinfo_timestamps("Input #0, mov,mp4").is_empty());
        assert!(parse_showinfo_timestamps("").is_empty());
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_yields_no_frames() {
        let out = tempfile::tempdir().unwrap();
        let sampler = FfmpegFrameSampler::new("/nonexistent/ffmpeg", "/nonexistent/ffprobe", 5);

        assert!(!sampler.available().await);
        assert!(!sampler.ffprobe_available().await);
        assert!(sampler
            .probe_duration(Path::new("/tmp/video.mp4"))
            .await
            .is_none());
        let frames = sampler
            .sample(Path::new("/tmp/video.mp4"), Some(10.0), 4, out.path())
            .await;
        assert!(frames.is_empty());
    }
}

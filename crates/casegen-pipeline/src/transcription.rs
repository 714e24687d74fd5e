//! Speech-to-text cascade.
//!
//! Backends are tried in order, each gated by its own availability probe:
//! native whisper.cpp, the Python `whisper` package, a substitute narrative
//! from the local generative-AI endpoint, and finally a static placeholder.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use casegen_core::{
    format_timestamp, AudioClip, Error, Result, Transcript, TranscriptSegment, TranscriptSource,
};
use casegen_inference::{GenerationBackend, GenerationRequest};

use crate::command::{run_cmd_status, run_cmd_with_timeout, tool_command, ToolProbe};

/// Backend for transcribing an extracted audio clip.
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Check if the backend can run on this host.
    async fn available(&self) -> bool;

    /// Transcribe the clip. `work_dir` is a scratch directory inside the
    /// run workspace.
    async fn transcribe(&self, clip: &AudioClip, work_dir: &Path) -> Result<Transcript>;
}

// =============================================================================
// whisper.cpp
// =============================================================================

#[derive(Deserialize)]
struct WhisperCppOutput {
    #[serde(default)]
    transcription: Vec<WhisperCppEntry>,
}

#[derive(Deserialize)]
struct WhisperCppEntry {
    #[serde(default)]
    offsets: Option<WhisperCppOffsets>,
    text: String,
}

#[derive(Deserialize)]
struct WhisperCppOffsets {
    from: u64,
    to: u64,
}

/// Parse the `-oj` JSON written by whisper.cpp.
///
/// Offsets are milliseconds.
pub fn parse_whisper_cpp_json(json: &str) -> Result<Transcript> {
    let output: WhisperCppOutput = serde_json::from_str(json)?;
    let segments: Vec<TranscriptSegment> = output
        .transcription
        .into_iter()
        .filter_map(|entry| {
            let text = entry.text.trim().to_string();
            if text.is_empty() {
                return None;
            }
            let (start, end) = entry
                .offsets
                .map(|o| (o.from as f64 / 1000.0, o.to as f64 / 1000.0))
                .unwrap_or((0.0, 0.0));
            Some(TranscriptSegment {
                start_secs: start,
                end_secs: end,
                text,
            })
        })
        .collect();

    let text = segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    Ok(Transcript {
        segments,
        ..Transcript::new(text, TranscriptSource::WhisperCpp)
    })
}

/// Native whisper.cpp CLI: `-m model -f audio.wav -oj -of prefix`.
pub struct WhisperCppBackend {
    probe: ToolProbe,
    model: Option<PathBuf>,
    timeout_secs: u64,
}

impl WhisperCppBackend {
    pub fn new(bin: &str, model: Option<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            probe: ToolProbe::new(bin, &["--help"]),
            model,
            timeout_secs,
        }
    }
}

#[async_trait]
impl TranscriptionBackend for WhisperCppBackend {
    fn name(&self) -> &str {
        "whisper_cpp"
    }

    async fn available(&self) -> bool {
        match &self.model {
            Some(model) if model.is_file() => self.probe.is_available().await,
            _ => false,
        }
    }

    async fn transcribe(&self, clip: &AudioClip, work_dir: &Path) -> Result<Transcript> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| Error::ToolUnavailable("whisper.cpp model not configured".into()))?;
        let prefix = work_dir.join("transcript");

        let mut cmd = tool_command(self.probe.bin());
        cmd.arg("-m")
            .arg(model)
            .arg("-f")
            .arg(&clip.path)
            .arg("-oj")
            .arg("-of")
            .arg(&prefix);
        run_cmd_status(&mut cmd, "whisper.cpp", self.timeout_secs * 5).await?;

        let json_path = prefix.with_extension("json");
        let json = tokio::fs::read_to_string(&json_path).await.map_err(|e| {
            Error::ToolExecution(format!(
                "whisper.cpp produced no output at {}: {}",
                json_path.display(),
                e
            ))
        })?;
        parse_whisper_cpp_json(&json)
    }
}

// =============================================================================
// Python whisper
// =============================================================================

/// Inline script run as `python -c SCRIPT <audio> <model>`; prints one JSON line.
const PYTHON_WHISPER_SCRIPT: &str = r#"
import json, sys, whisper
model = whisper.load_model(sys.argv[2])
result = model.transcribe(sys.argv[1])
print(json.dumps({
    "text": result.get("text", ""),
    "segments": [
        {"start": s["start"], "end": s["end"], "text": s["text"]}
        for s in result.get("segments", [])
    ],
}))
"#;

#[derive(Deserialize)]
struct PythonWhisperOutput {
    text: String,
    #[serde(default)]
    segments: Vec<PythonWhisperSegment>,
}

#[derive(Deserialize)]
struct PythonWhisperSegment {
    start: f64,
    end: f64,
    text: String,
}

/// Parse the script's stdout, taking the last JSON line.
pub fn parse_python_whisper_output(stdout: &str) -> Result<Transcript> {
    let line = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| l.starts_with('{'))
        .ok_or_else(|| Error::ToolExecution("whisper script printed no JSON".into()))?;
    let output: PythonWhisperOutput = serde_json::from_str(line)?;

    Ok(Transcript {
        segments: output
            .segments
            .into_iter()
            .map(|s| TranscriptSegment {
                start_secs: s.start,
                end_secs: s.end,
                text: s.text.trim().to_string(),
            })
            .filter(|s| !s.text.is_empty())
            .collect(),
        ..Transcript::new(output.text.trim(), TranscriptSource::WhisperPython)
    })
}

/// Scripted local speech model via the Python `whisper` package.
pub struct PythonWhisperBackend {
    probe: ToolProbe,
    model: String,
    timeout_secs: u64,
}

impl PythonWhisperBackend {
    pub fn new(python_bin: &str, model: &str, timeout_secs: u64) -> Self {
        Self {
            probe: ToolProbe::new(python_bin, &["-c", "import whisper"]),
            model: model.to_string(),
            timeout_secs,
        }
    }
}

#[async_trait]
impl TranscriptionBackend for PythonWhisperBackend {
    fn name(&self) -> &str {
        "whisper_python"
    }

    async fn available(&self) -> bool {
        self.probe.is_available().await
    }

    async fn transcribe(&self, clip: &AudioClip, _work_dir: &Path) -> Result<Transcript> {
        let mut cmd = tool_command(self.probe.bin());
        cmd.arg("-c")
            .arg(PYTHON_WHISPER_SCRIPT)
            .arg(&clip.path)
            .arg(&self.model);
        let stdout = run_cmd_with_timeout(&mut cmd, "python whisper", self.timeout_secs * 5).await?;
        parse_python_whisper_output(&stdout)
    }
}

// =============================================================================
// Local generative-AI substitute
// =============================================================================

/// Asks the local generative-AI endpoint for a plausible narration.
///
/// The endpoint never hears the audio, so the result is a degraded
/// substitute, tagged [`TranscriptSource::LocalAiNarrative`].
pub struct LocalAiNarrativeBackend {
    backend: Arc<dyn GenerationBackend>,
}

impl LocalAiNarrativeBackend {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl TranscriptionBackend for LocalAiNarrativeBackend {
    fn name(&self) -> &str {
        "local_ai_narrative"
    }

    async fn available(&self) -> bool {
        self.backend.health_check().await.unwrap_or(false)
    }

    async fn transcribe(&self, clip: &AudioClip, _work_dir: &Path) -> Result<Transcript> {
        let length = clip
            .duration_secs
            .map(|d| format!("about {}", format_timestamp(d)))
            .unwrap_or_else(|| "unknown length".to_string());
        let request = GenerationRequest::new(format!(
            "A screen recording of {} contains spoken narration that could not be \
             transcribed. Write two or three short sentences a QA engineer might say \
             while demonstrating a software workflow. Output only the narration.",
            length
        ));
        let text = self.backend.generate(&request).await?;
        Ok(Transcript::new(text.trim(), TranscriptSource::LocalAiNarrative))
    }
}

// =============================================================================
// Cascade
// =============================================================================

/// Ordered cascade of transcription backends ending in a placeholder.
#[derive(Clone, Default)]
pub struct Transcriber {
    backends: Vec<Arc<dyn TranscriptionBackend>>,
}

impl Transcriber {
    pub fn new(backends: Vec<Arc<dyn TranscriptionBackend>>) -> Self {
        Self { backends }
    }

    pub fn backends(&self) -> &[Arc<dyn TranscriptionBackend>] {
        &self.backends
    }

    /// First non-empty transcript from an available backend, else the
    /// placeholder. Never fails.
    pub async fn transcribe(&self, clip: &AudioClip, work_dir: &Path) -> Transcript {
        for backend in &self.backends {
            if !backend.available().await {
                debug!(tool = backend.name(), "Transcription backend unavailable");
                continue;
            }
            match backend.transcribe(clip, work_dir).await {
                Ok(t) if !t.text.trim().is_empty() => {
                    info!(tool = backend.name(), chars = t.text.len(), "Audio transcribed");
                    return t;
                }
                Ok(_) => warn!(tool = backend.name(), "Empty transcript, trying next backend"),
                Err(e) => {
                    warn!(tool = backend.name(), error = %e, "Transcription failed, trying next backend")
                }
            }
        }
        warn!("No transcription backend produced text, using placeholder");
        Transcript::placeholder()
    }

    /// Like [`Transcriber::transcribe`], but gives up at `deadline` and
    /// returns the placeholder.
    pub async fn transcribe_until(
        &self,
        clip: &AudioClip,
        work_dir: &Path,
        deadline: tokio::time::Instant,
    ) -> Transcript {
        match tokio::time::timeout_at(deadline, self.transcribe(clip, work_dir)).await {
            Ok(transcript) => transcript,
            Err(_) => {
                warn!("Transcription exceeded the strategy budget, using placeholder");
                Transcript::placeholder()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn clip() -> AudioClip {
        AudioClip {
            path: PathBuf::from("/tmp/audio.wav"),
            duration_secs: Some(12.0),
            sample_rate: 16_000,
        }
    }

    #[test]
    fn test_parse_whisper_cpp_json() {
        let json = r#"{
            "systeminfo": "AVX = 1",
            "transcription": [
                {"timestamps": {"from": "00:00:00,000", "to": "00:00:02,500"},
                 "offsets": {"from": 0, "to": 2500}, "text": " Click the login button."},
                {"offsets": {"from": 2500, "to": 5000}, "text": "   "},
                {"offsets": {"from": 5000, "to": 8000}, "text": " Enter your password."}
            ]
        }"#;
        let t = parse_whisper_cpp_json(json).unwrap();
        assert_eq!(t.source, TranscriptSource::WhisperCpp);
        assert_eq!(t.text, "Click the login button. Enter your password.");
        assert_eq!(t.segments.len(), 2);
        assert_eq!(t.segments[1].start_secs, 5.0);
        assert_eq!(t.segments[0].end_secs, 2.5);
        assert!(t.is_literal());
    }

    #[test]
    fn test_parse_whisper_cpp_invalid_json() {
        assert!(parse_whisper_cpp_json("not json").is_err());
    }

    #[test]
    fn test_parse_python_whisper_output_skips_noise() {
        let stdout = "Loading model...\n{\"text\": \" Scroll down the list\", \"segments\": [{\"start\": 1.0, \"end\": 2.0, \"text\": \" Scroll down the list\"}]}\n";
        let t = parse_python_whisper_output(stdout).unwrap();
        assert_eq!(t.source, TranscriptSource::WhisperPython);
        assert_eq!(t.text, "Scroll down the list");
        assert_eq!(t.segments[0].start_secs, 1.0);
    }

    #[test]
    fn test_parse_python_whisper_output_no_json() {
        assert!(parse_python_whisper_output("Traceback (most recent call last)").is_err());
    }

    struct FakeBackend {
        name: &'static str,
        available: bool,
        result: std::result::Result<&'static str, ()>,
        calls: AtomicUsize,
    }

    impl FakeBackend {
        fn new(name: &'static str, available: bool, result: std::result::Result<&'static str, ()>) -> Arc<Self> {
            Arc::new(Self {
                name,
                available,
                result,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TranscriptionBackend for FakeBackend {
        fn name(&self) -> &str {
            self.name
        }
        async fn available(&self) -> bool {
            self.available
        }
        async fn transcribe(&self, _clip: &AudioClip, _work_dir: &Path) -> Result<Transcript> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.result {
                Ok(text) => Ok(Transcript::new(text, TranscriptSource::WhisperPython)),
                Err(()) => Err(Error::ToolExecution("boom".into())),
            }
        }
    }

    #[tokio::test]
    async fn test_cascade_first_success_wins() {
        let unavailable = FakeBackend::new("a", false, Ok("never"));
        let failing = FakeBackend::new("b", true, Err(()));
        let empty = FakeBackend::new("c", true, Ok("  "));
        let good = FakeBackend::new("d", true, Ok("Open settings"));
        let later = FakeBackend::new("e", true, Ok("unused"));

        let transcriber = Transcriber::new(vec![
            unavailable.clone(),
            failing.clone(),
            empty.clone(),
            good.clone(),
            later.clone(),
        ]);
        let t = transcriber.transcribe(&clip(), Path::new("/tmp")).await;

        assert_eq!(t.text, "Open settings");
        assert_eq!(unavailable.calls.load(Ordering::SeqCst), 0);
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(empty.calls.load(Ordering::SeqCst), 1);
        assert_eq!(later.calls.load(Ordering::SeqCst), 0);
    }

    struct StalledBackend;

    #[async_trait]
    impl TranscriptionBackend for StalledBackend {
        fn name(&self) -> &str {
            "stalled"
        }
        async fn available(&self) -> bool {
            true
        }
        async fn transcribe(&self, _clip: &AudioClip, _work_dir: &Path) -> Result<Transcript> {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            Ok(Transcript::new("too late", TranscriptSource::WhisperCpp))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_yields_placeholder() {
        let transcriber = Transcriber::new(vec![Arc::new(StalledBackend)]);
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(2);

        let t = transcriber
            .transcribe_until(&clip(), Path::new("/tmp"), deadline)
            .await;
        assert_eq!(t.source, TranscriptSource::Placeholder);
    }

    #[tokio::test]
    async fn test_all_backends_absent_yields_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let transcriber = Transcriber::new(vec![
            Arc::new(WhisperCppBackend::new("/nonexistent/whisper-cli", None, 5)),
            Arc::new(PythonWhisperBackend::new("/nonexistent/python3", "base", 5)),
        ]);
        let t = transcriber.transcribe(&clip(), dir.path()).await;
        assert_eq!(t.text, "Audio content detected");
        assert_eq!(t.source, TranscriptSource::Placeholder);
    }

    #[tokio::test]
    async fn test_whisper_cpp_unavailable_without_model() {
        let backend = WhisperCppBackend::new("whisper-cli", None, 5);
        assert!(!backend.available().await);
        let err = backend
            .transcribe(&clip(), Path::new("/tmp"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolUnavailable(_)));
    }
}

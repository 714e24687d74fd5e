//! Core data models for casegen.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// =============================================================================
// MEDIA ASSET
// =============================================================================

/// Lifecycle status of an uploaded recording.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaStatus {
    #[default]
    Uploaded,
    Analyzing,
    Completed,
    Failed,
}

/// Outcome of asking an asset to enter the `analyzing` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStart {
    /// The asset moved to `analyzing`; a job must be run.
    Started,
    /// The asset is already completed and re-analysis was not forced.
    AlreadyCompleted,
}

/// An uploaded screen recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: Uuid,
    pub storage_path: PathBuf,
    pub filename: String,
    pub duration_secs: Option<f64>,
    pub size_bytes: u64,
    pub owner_id: Option<String>,
    pub status: MediaStatus,
    /// Job that owns the current `analyzing` run. Only this job may store
    /// an outcome.
    #[serde(default)]
    pub current_job: Option<Uuid>,
    /// Message of the last unrecoverable failure, kept for diagnostics.
    pub error_message: Option<String>,
    pub result: Option<AnalysisEnvelope>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaAsset {
    /// Create a freshly uploaded asset.
    pub fn new(
        storage_path: PathBuf,
        filename: impl Into<String>,
        size_bytes: u64,
        owner_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            storage_path,
            filename: filename.into(),
            duration_secs: None,
            size_bytes,
            owner_id,
            status: MediaStatus::Uploaded,
            current_job: None,
            error_message: None,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Transition to `analyzing`.
    ///
    /// Forced requests succeed from any state. Unforced requests start from
    /// `uploaded` or `failed`, are rejected while `analyzing`, and leave a
    /// `completed` asset (and its result) untouched. Every start assigns a
    /// fresh `current_job`, superseding any job still in flight.
    pub fn begin_analysis(&mut self, force: bool) -> Result<AnalysisStart> {
        if !force {
            match self.status {
                MediaStatus::Analyzing => {
                    return Err(Error::Conflict(format!(
                        "Media {} is already being analyzed",
                        self.id
                    )))
                }
                MediaStatus::Completed => return Ok(AnalysisStart::AlreadyCompleted),
                MediaStatus::Uploaded | MediaStatus::Failed => {}
            }
        }
        self.status = MediaStatus::Analyzing;
        self.current_job = Some(Uuid::now_v7());
        self.error_message = None;
        self.updated_at = Utc::now();
        Ok(AnalysisStart::Started)
    }

    /// Transition `analyzing` → `completed`, storing the result of `job_id`.
    pub fn complete(&mut self, job_id: Uuid, envelope: AnalysisEnvelope) -> Result<()> {
        self.expect_current_job(job_id)?;
        if self.duration_secs.is_none() {
            self.duration_secs = envelope.duration_secs;
        }
        self.status = MediaStatus::Completed;
        self.current_job = None;
        self.result = Some(envelope);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Transition `analyzing` → `failed`, retaining the message of `job_id`.
    pub fn fail(&mut self, job_id: Uuid, message: impl Into<String>) -> Result<()> {
        self.expect_current_job(job_id)?;
        self.status = MediaStatus::Failed;
        self.current_job = None;
        self.error_message = Some(message.into());
        self.updated_at = Utc::now();
        Ok(())
    }

    fn expect_current_job(&self, job_id: Uuid) -> Result<()> {
        if self.status != MediaStatus::Analyzing || self.current_job != Some(job_id) {
            return Err(Error::Superseded(format!(
                "Job {} no longer owns media {} ({:?})",
                job_id, self.id, self.status
            )));
        }
        Ok(())
    }
}

// =============================================================================
// TRANSIENT PIPELINE ARTIFACTS
// =============================================================================

/// A still image sampled from the recording. Lives only inside one run's workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub timestamp_secs: f64,
    pub path: PathBuf,
    pub text: Option<String>,
}

/// Extracted audio track. Lives only inside one run's workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioClip {
    pub path: PathBuf,
    pub duration_secs: Option<f64>,
    pub sample_rate: u32,
}

/// Backend that produced a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptSource {
    /// Native whisper.cpp binary.
    WhisperCpp,
    /// Python `whisper` package invoked as a script.
    WhisperPython,
    /// Substitute narrative from the local generative-AI endpoint.
    LocalAiNarrative,
    /// Static placeholder.
    Placeholder,
}

impl fmt::Display for TranscriptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TranscriptSource::WhisperCpp => "whisper_cpp",
            TranscriptSource::WhisperPython => "whisper_python",
            TranscriptSource::LocalAiNarrative => "local_ai_narrative",
            TranscriptSource::Placeholder => "placeholder",
        };
        f.write_str(name)
    }
}

/// A timed piece of a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start_secs: f64,
    pub end_secs: f64,
    pub text: String,
}

/// Speech (or substitute) text for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub source: TranscriptSource,
    /// Best-effort confidence; most backends do not report one.
    pub confidence: Option<f32>,
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    pub fn new(text: impl Into<String>, source: TranscriptSource) -> Self {
        Self {
            text: text.into(),
            source,
            confidence: None,
            segments: Vec::new(),
        }
    }

    /// The static transcript used when no speech backend produced text.
    pub fn placeholder() -> Self {
        Self::new(
            crate::defaults::AUDIO_PLACEHOLDER_TRANSCRIPT,
            TranscriptSource::Placeholder,
        )
    }

    /// Whether this is literal speech rather than a placeholder or substitute narrative.
    pub fn is_literal(&self) -> bool {
        matches!(
            self.source,
            TranscriptSource::WhisperCpp | TranscriptSource::WhisperPython
        )
    }
}

// =============================================================================
// INTERACTION TIMELINE
// =============================================================================

/// Kind of UI action inferred from on-screen or spoken text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Click,
    Type,
    Scroll,
    Navigate,
}

/// One normalized UI action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub timestamp_secs: f64,
    pub kind: InteractionKind,
    /// Best-guess target, e.g. "Login" or "Username".
    pub target: String,
    /// Text fragment the event was inferred from.
    pub raw: String,
}

impl InteractionEvent {
    /// Human label such as "Login button" or "Username field".
    pub fn display_label(&self) -> String {
        match self.kind {
            InteractionKind::Click => format!("{} button", self.target),
            InteractionKind::Type => format!("{} field", self.target),
            InteractionKind::Scroll | InteractionKind::Navigate => self.target.clone(),
        }
    }

    /// Key used to merge duplicates across frames.
    pub fn normalized_key(&self) -> String {
        self.display_label().trim().to_lowercase()
    }
}

/// Format seconds as `mm:ss` (minutes are not wrapped at 60).
pub fn format_timestamp(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}

// =============================================================================
// ANALYSIS RESULT
// =============================================================================

/// Test case priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// The canonical duration table.
    ///
    /// | duration          | priority |
    /// |-------------------|----------|
    /// | unknown or < 60 s | Medium   |
    /// | 60 s ..= 180 s    | High     |
    /// | > 180 s           | Critical |
    pub fn from_duration(duration_secs: Option<f64>) -> Self {
        use crate::defaults::{PRIORITY_CRITICAL_ABOVE_SECS, PRIORITY_HIGH_MIN_SECS};
        match duration_secs {
            Some(d) if d.is_finite() && d > PRIORITY_CRITICAL_ABOVE_SECS => Priority::Critical,
            Some(d) if d.is_finite() && d >= PRIORITY_HIGH_MIN_SECS => Priority::High,
            _ => Priority::Medium,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::Critical => "Critical",
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        };
        f.write_str(name)
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "critical" | "urgent" | "blocker" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "medium" | "normal" => Ok(Priority::Medium),
            "low" | "minor" => Ok(Priority::Low),
            other => Err(Error::InvalidInput(format!("Unknown priority: {}", other))),
        }
    }
}

/// Test case status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestStatus {
    #[default]
    Draft,
    Ready,
    Approved,
    Deprecated,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TestStatus::Draft => "Draft",
            TestStatus::Ready => "Ready",
            TestStatus::Approved => "Approved",
            TestStatus::Deprecated => "Deprecated",
        };
        f.write_str(name)
    }
}

/// Structured QA test case synthesized from a recording.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub title: String,
    pub summary: String,
    pub description: String,
    pub preconditions: String,
    pub steps: Vec<String>,
    pub expected_results: String,
    pub priority: Priority,
    pub status: TestStatus,
    pub narrator_script: String,
    /// Ordered `[mm:ss] text` entries.
    pub timestamp_actions: Vec<String>,
    pub video_source: String,
}

/// The pipeline's sole output: the result plus alias fields and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisEnvelope {
    #[serde(flatten)]
    pub result: AnalysisResult,
    /// Same text as `description`.
    pub full_script: String,
    /// `steps` joined with newlines.
    pub test_steps: String,
    /// Name of the strategy that produced the result.
    pub strategy: String,
    pub duration_secs: Option<f64>,
    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisEnvelope {
    pub fn new(result: AnalysisResult, strategy: impl Into<String>, duration_secs: Option<f64>) -> Self {
        Self {
            full_script: result.description.clone(),
            test_steps: result.steps.join("\n"),
            result,
            strategy: strategy.into(),
            duration_secs,
            analyzed_at: Utc::now(),
        }
    }
}

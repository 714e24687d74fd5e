//! Result envelope assembly.
//!
//! Fills the presentation fields (summary, narrator script, timestamped
//! actions) and substitutes placeholders for any required field left empty,
//! so every completed asset carries a usable test case.

use casegen_core::{
    format_timestamp, AnalysisEnvelope, AnalysisResult, InteractionEvent, Transcript,
};

use crate::strategies::VideoSource;
use crate::synthesizer::{narration_for_event, step_for_event};

pub const PLACEHOLDER_TITLE: &str = "Untitled Video Test Case";
pub const PLACEHOLDER_PRECONDITIONS: &str = "Application is running and accessible to the user";
pub const PLACEHOLDER_EXPECTED: &str = "All recorded actions complete without errors";

fn placeholder_steps() -> Vec<String> {
    vec![
        "Open the application".to_string(),
        "Perform the workflow shown in the recording".to_string(),
        "Verify the expected results are displayed".to_string(),
    ]
}

/// Completes an [`AnalysisResult`] and wraps it in an [`AnalysisEnvelope`].
///
/// Only empty fields are touched, so completing twice is a no-op.
pub struct EnvelopeBuilder<'a> {
    source: &'a VideoSource,
    events: &'a [InteractionEvent],
    transcript: Option<&'a Transcript>,
}

impl<'a> EnvelopeBuilder<'a> {
    pub fn new(source: &'a VideoSource) -> Self {
        Self {
            source,
            events: &[],
            transcript: None,
        }
    }

    /// Timeline used for `timestamp_actions` and narration.
    pub fn with_events(mut self, events: &'a [InteractionEvent]) -> Self {
        self.events = events;
        self
    }

    /// Literal transcripts become the narrator script.
    pub fn with_transcript(mut self, transcript: Option<&'a Transcript>) -> Self {
        self.transcript = transcript;
        self
    }

    pub fn complete(&self, mut result: AnalysisResult) -> AnalysisResult {
        result.title = result.title.trim().to_string();
        if result.title.is_empty() {
            result.title = if self.source.filename.trim().is_empty() {
                PLACEHOLDER_TITLE.to_string()
            } else {
                format!("Video Test Case: {}", self.source.filename)
            };
        }

        if result.description.trim().is_empty() {
            result.description = format!(
                "Test case generated from the screen recording \"{}\".",
                self.source.filename
            );
        }

        if result.preconditions.trim().is_empty() {
            result.preconditions = PLACEHOLDER_PRECONDITIONS.to_string();
        }

        result.steps = result
            .steps
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if result.steps.is_empty() {
            result.steps = placeholder_steps();
        }

        if result.expected_results.trim().is_empty() {
            result.expected_results = PLACEHOLDER_EXPECTED.to_string();
        }

        if result.video_source.trim().is_empty() {
            result.video_source = self.source.filename.clone();
        }

        if result.timestamp_actions.is_empty() {
            result.timestamp_actions = self.timestamp_actions(&result.steps);
        }

        if result.narrator_script.trim().is_empty() {
            result.narrator_script = self.narrator_script(&result.steps);
        }

        if result.summary.trim().is_empty() {
            result.summary = self.summary(&result);
        }

        result
    }

    /// Complete `result` and wrap it with the alias fields and strategy name.
    pub fn build(&self, result: AnalysisResult, strategy: &str) -> AnalysisEnvelope {
        AnalysisEnvelope::new(self.complete(result), strategy, self.source.duration_secs)
    }

    fn timestamp_actions(&self, steps: &[String]) -> Vec<String> {
        if !self.events.is_empty() {
            return self
                .events
                .iter()
                .map(|e| format!("[{}] {}", format_timestamp(e.timestamp_secs), step_for_event(e)))
                .collect();
        }

        // No timeline: spread the steps evenly over the recording.
        let step_secs = match self.source.duration_secs {
            Some(d) if d.is_finite() && d > 0.0 => d / steps.len().max(1) as f64,
            _ => 0.0,
        };
        steps
            .iter()
            .enumerate()
            .map(|(i, s)| format!("[{}] {}", format_timestamp(i as f64 * step_secs), s))
            .collect()
    }

    fn narrator_script(&self, steps: &[String]) -> String {
        if let Some(t) = self.transcript.filter(|t| t.is_literal() && !t.text.trim().is_empty()) {
            return t.text.trim().to_string();
        }
        if !self.events.is_empty() {
            return self
                .events
                .iter()
                .map(narration_for_event)
                .collect::<Vec<_>>()
                .join(" ");
        }
        steps
            .iter()
            .enumerate()
            .map(|(i, s)| format!("Step {}: {}.", i + 1, s.trim_end_matches('.')))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn summary(&self, result: &AnalysisResult) -> String {
        let length = match self.source.duration_secs {
            Some(d) if d.is_finite() && d > 0.0 => format!("a {} recording", format_timestamp(d)),
            _ => "a screen recording".to_string(),
        };
        let noun = if result.steps.len() == 1 { "step" } else { "steps" };
        format!(
            "{}: {} {} derived from {}.",
            result.title,
            result.steps.len(),
            noun,
            length
        )
    }
}

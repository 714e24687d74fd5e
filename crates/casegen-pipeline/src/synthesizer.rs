//! Deterministic mapping from an interaction timeline to a test case.
//!
//! Nothing here fails: every input, including an empty timeline, maps to a
//! well-formed [`AnalysisResult`].

use std::path::Path;

use casegen_core::{
    format_timestamp, AnalysisResult, InteractionEvent, InteractionKind, Priority, TestStatus,
    Transcript,
};

use crate::heuristics::HeuristicsReport;

const LOGIN_CLASS: &[&str] = &["Login"];
const SUBMIT_CLASS: &[&str] = &["Submit", "Create"];
const SAVE_CLASS: &[&str] = &["Save", "Update", "Apply"];

const VERIFICATION_PHRASES: &[&str] = &["verify", "confirm", "check", "ensure", "validate"];

const MAX_NARRATION_QUOTE: usize = 240;

/// Inputs to [`synthesize`].
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    pub filename: &'a str,
    pub duration_secs: Option<f64>,
    pub report: &'a HeuristicsReport,
    pub transcript: Option<&'a Transcript>,
}

/// Imperative step text for one event.
pub fn step_for_event(event: &InteractionEvent) -> String {
    match event.kind {
        InteractionKind::Click => format!("Click the {} button", event.target),
        InteractionKind::Type => format!("Enter data in {} field", event.target),
        InteractionKind::Navigate => format!("Navigate to the {} screen", event.target),
        InteractionKind::Scroll => format!("Scroll through the {}", event.target),
    }
}

/// Third-person sentence for one event, used in narration.
pub fn narration_for_event(event: &InteractionEvent) -> String {
    let action = match event.kind {
        InteractionKind::Click => format!("clicks the {} button", event.target),
        InteractionKind::Type => format!("enters data in the {} field", event.target),
        InteractionKind::Navigate => format!("navigates to the {} screen", event.target),
        InteractionKind::Scroll => format!("scrolls through the {}", event.target),
    };
    format!("At {}, the user {}.", format_timestamp(event.timestamp_secs), action)
}

fn clicked(events: &[InteractionEvent], class: &[&str]) -> bool {
    events.iter().any(|e| {
        e.kind == InteractionKind::Click && class.iter().any(|c| c.eq_ignore_ascii_case(&e.target))
    })
}

/// Expected outcome, by precedence: login, submit, save, any field, default.
pub fn expected_results(events: &[InteractionEvent]) -> String {
    if clicked(events, LOGIN_CLASS) {
        "User is authenticated successfully and redirected to the dashboard".to_string()
    } else if clicked(events, SUBMIT_CLASS) {
        "Form is submitted successfully and a confirmation is displayed".to_string()
    } else if clicked(events, SAVE_CLASS) {
        "Changes are saved and a success message is displayed".to_string()
    } else if events.iter().any(|e| e.kind == InteractionKind::Type) {
        "Entered data is accepted and displayed correctly".to_string()
    } else {
        "All recorded actions complete without errors".to_string()
    }
}

/// Whether a step already performs verification.
pub fn is_verification_step(step: &str) -> bool {
    let lower = step.to_lowercase();
    VERIFICATION_PHRASES.iter().any(|p| lower.contains(p))
}

fn lower_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Ordered steps for a timeline, ending with a verification step unless one
/// is already present.
pub fn synthesize_steps(events: &[InteractionEvent], expected: &str) -> Vec<String> {
    let mut steps: Vec<String> = if events.is_empty() {
        vec![
            "Open the application".to_string(),
            "Perform the workflow shown in the recording".to_string(),
        ]
    } else {
        events.iter().map(step_for_event).collect()
    };

    if !steps.iter().any(|s| is_verification_step(s)) {
        steps.push(format!("Verify that {}", lower_first(expected)));
    }
    steps
}

/// Turn `login_flow-v2.mp4` into `Login Flow V2`. Purely numeric tokens
/// (dates, counters) are dropped.
pub fn humanize_filename(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    stem.split(|c: char| c == '_' || c == '-' || c == '.' || c.is_whitespace())
        .filter(|t| !t.is_empty() && !t.chars().all(|c| c.is_ascii_digit()))
        .map(|t| {
            let mut chars = t.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Test case title from the filename, falling back to the first action.
pub fn derive_title(filename: &str, events: &[InteractionEvent]) -> String {
    let humanized = humanize_filename(filename);
    if !humanized.is_empty() {
        if humanized.to_lowercase().ends_with("test") {
            return humanized;
        }
        return format!("{} Test", humanized);
    }
    match events.first() {
        Some(e) => format!("{} Workflow Test", e.target),
        None => "Recorded Workflow Test".to_string(),
    }
}

fn preconditions(events: &[InteractionEvent]) -> String {
    let needs_account = clicked(events, LOGIN_CLASS)
        || events.iter().any(|e| {
            e.kind == InteractionKind::Type
                && (e.target.eq_ignore_ascii_case("Password")
                    || e.target.eq_ignore_ascii_case("Username"))
        });
    if needs_account {
        "User has a valid account and the login screen is displayed".to_string()
    } else {
        "Application is running and accessible to the user".to_string()
    }
}

fn description(input: &SynthesisInput<'_>) -> String {
    let length = input
        .duration_secs
        .map(|d| format!(" ({})", format_timestamp(d)))
        .unwrap_or_default();
    let mut text = format!(
        "Test case derived from the screen recording \"{}\"{}.",
        input.filename, length
    );

    let observed: Vec<String> = input
        .report
        .events
        .iter()
        .map(InteractionEvent::display_label)
        .collect();
    if !observed.is_empty() {
        text.push_str(&format!(" Observed interactions: {}.", observed.join(", ")));
    }

    if let Some(t) = input.transcript.filter(|t| t.is_literal()) {
        let quote: String = t.text.chars().take(MAX_NARRATION_QUOTE).collect();
        let ellipsis = if t.text.chars().count() > MAX_NARRATION_QUOTE {
            "..."
        } else {
            ""
        };
        text.push_str(&format!(" Narration: \"{}{}\"", quote.trim(), ellipsis));
    }
    text
}

/// Map a heuristics report into the canonical test case schema.
///
/// Summary, narrator script and timestamped actions are left for
/// [`crate::envelope::EnvelopeBuilder`].
pub fn synthesize(input: &SynthesisInput<'_>) -> AnalysisResult {
    let events = &input.report.events;
    let expected = expected_results(events);
    AnalysisResult {
        title: derive_title(input.filename, events),
        description: description(input),
        preconditions: preconditions(events),
        steps: synthesize_steps(events, &expected),
        expected_results: expected,
        priority: Priority::from_duration(input.duration_secs),
        status: TestStatus::Draft,
        video_source: input.filename.to_string(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casegen_core::TranscriptSource;

    fn ev(kind: InteractionKind, target: &str) -> InteractionEvent {
        InteractionEvent {
            timestamp_secs: 0.0,
            kind,
            target: target.to_string(),
            raw: target.to_string(),
        }
    }

    #[test]
    fn test_expected_results_precedence() {
        use InteractionKind::*;
        let cases: Vec<(Vec<InteractionEvent>, &str)> = vec![
            (vec![ev(Click, "Save"), ev(Click, "Login")], "authenticated"),
            (vec![ev(Type, "Name"), ev(Click, "Submit"), ev(Click, "Save")], "submitted"),
            (vec![ev(Type, "Title"), ev(Click, "Save")], "saved"),
            (vec![ev(Type, "Email"), ev(Navigate, "Home")], "accepted"),
            (vec![ev(Navigate, "Home")], "complete without errors"),
            (vec![], "complete without errors"),
        ];
        for (events, needle) in cases {
            let expected = expected_results(&events);
            assert!(expected.contains(needle), "{:?} -> {}", events, expected);
        }
    }

    #[test]
    fn test_step_phrasing() {
        assert_eq!(step_for_event(&ev(InteractionKind::Click, "Login")), "Click the Login button");
        assert_eq!(
            step_for_event(&ev(InteractionKind::Type, "Username")),
            "Enter data in Username field"
        );
        assert_eq!(
            step_for_event(&ev(InteractionKind::Navigate, "Dashboard")),
            "Navigate to the Dashboard screen"
        );
        assert_eq!(step_for_event(&ev(InteractionKind::Scroll, "list")), "Scroll through the list");
    }

    #[test]
    fn test_verification_step_appended_once() {
        let events = vec![ev(InteractionKind::Click, "Login")];
        let steps = synthesize_steps(&events, &expected_results(&events));
        assert_eq!(steps.len(), 2);
        assert_eq!(
            steps[1],
            "Verify that user is authenticated successfully and redirected to the dashboard"
        );

        let steps = synthesize_steps(&[ev(InteractionKind::Click, "Check")], "x");
        assert_eq!(steps, vec!["Click the Check button"]);
    }

    #[test]
    fn test_steps_for_empty_timeline_are_not_empty() {
        let steps = synthesize_steps(&[], "All recorded actions complete without errors");
        assert_eq!(steps.len(), 3);
        assert!(steps.iter().all(|s| !s.is_empty()));
    }

    #[test]
    fn test_humanize_filename() {
        assert_eq!(humanize_filename("login_flow.mp4"), "Login Flow");
        assert_eq!(humanize_filename("checkout-v2.final.mov"), "Checkout V2 Final");
        assert_eq!(humanize_filename("2024-01-05_123.mp4"), "");
        assert_eq!(humanize_filename(""), "");
    }

    #[test]
    fn test_derive_title() {
        assert_eq!(derive_title("login_flow.mp4", &[]), "Login Flow Test");
        assert_eq!(derive_title("smoke_test.mp4", &[]), "Smoke Test");
        assert_eq!(
            derive_title("20240105.mp4", &[ev(InteractionKind::Click, "Save")]),
            "Save Workflow Test"
        );
        assert_eq!(derive_title("20240105.mp4", &[]), "Recorded Workflow Test");
    }

    #[test]
    fn test_synthesize_login_report() {
        let report = HeuristicsReport::from_events(vec![
            ev(InteractionKind::Click, "Login"),
            ev(InteractionKind::Type, "Username"),
            ev(InteractionKind::Type, "Password"),
            ev(InteractionKind::Click, "Submit"),
        ]);
        let result = synthesize(&SynthesisInput {
            filename: "login_flow.mp4",
            duration_secs: Some(95.0),
            report: &report,
            transcript: None,
        });

        assert_eq!(result.title, "Login Flow Test");
        assert_eq!(result.priority, Priority::High);
        assert_eq!(result.status, TestStatus::Draft);
        assert_eq!(result.steps.len(), 5);
        assert!(result.preconditions.contains("valid account"));
        assert!(result.description.contains("Login button"));
        assert!(result.description.contains("01:35"));
        assert_eq!(result.video_source, "login_flow.mp4");
    }

    #[test]
    fn test_description_quotes_literal_transcript_only() {
        let report = HeuristicsReport::default();
        let literal = Transcript::new("Click save now", TranscriptSource::WhisperCpp);
        let with = synthesize(&SynthesisInput {
            filename: "a.mp4",
            duration_secs: None,
            report: &report,
            transcript: Some(&literal),
        });
        assert!(with.description.contains("Narration: \"Click save now\""));

        let placeholder = Transcript::placeholder();
        let without = synthesize(&SynthesisInput {
            filename: "a.mp4",
            duration_secs: None,
            report: &report,
            transcript: Some(&placeholder),
        });
        assert!(!without.description.contains("Narration"));
    }

    #[test]
    fn test_narration_for_event() {
        let mut e = ev(InteractionKind::Click, "Login");
        e.timestamp_secs = 65.0;
        assert_eq!(narration_for_event(&e), "At 01:05, the user clicks the Login button.");
    }
}

//! UI action heuristics.
//!
//! Declarative `(pattern, label)` tables turn OCR text and transcripts into a
//! timestamp-ordered interaction timeline.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use casegen_core::{Frame, InteractionEvent, InteractionKind, Transcript, TranscriptSource};

/// One row of a pattern table.
struct Rule {
    pattern: Regex,
    label: &'static str,
}

fn table(kind: InteractionKind, rows: &[(&str, &'static str)]) -> (InteractionKind, Vec<Rule>) {
    let rules = rows
        .iter()
        .map(|(pattern, label)| Rule {
            pattern: Regex::new(&format!(r"(?i)\b(?:{})\b", pattern))
                .unwrap_or_else(|e| panic!("invalid heuristic pattern {}: {}", pattern, e)),
            label,
        })
        .collect();
    (kind, rules)
}

static BUTTONS: Lazy<(InteractionKind, Vec<Rule>)> = Lazy::new(|| {
    table(
        InteractionKind::Click,
        &[
            (r"log\s?in|sign\s?in", "Login"),
            (r"submit", "Submit"),
            (r"save", "Save"),
            (r"cancel", "Cancel"),
            (r"ok", "OK"),
            (r"apply", "Apply"),
            (r"next", "Next"),
            (r"back", "Back"),
            (r"continue", "Continue"),
            (r"create", "Create"),
            (r"add", "Add"),
            (r"delete", "Delete"),
            (r"edit", "Edit"),
            (r"update", "Update"),
        ],
    )
});

static FIELDS: Lazy<(InteractionKind, Vec<Rule>)> = Lazy::new(|| {
    table(
        InteractionKind::Type,
        &[
            (r"user\s?name", "Username"),
            (r"e-?mail", "Email"),
            (r"pass\s?word", "Password"),
            (r"name", "Name"),
            (r"phone", "Phone"),
            (r"address", "Address"),
            (r"search", "Search"),
            (r"message", "Message"),
            (r"title", "Title"),
            (r"description", "Description"),
            (r"comment", "Comment"),
        ],
    )
});

static LABELS: Lazy<(InteractionKind, Vec<Rule>)> = Lazy::new(|| {
    table(
        InteractionKind::Navigate,
        &[
            (r"welcome", "Welcome"),
            (r"dashboard", "Dashboard"),
            (r"home", "Home"),
            (r"profile", "Profile"),
            (r"settings", "Settings"),
            (r"log\s?out|sign\s?out", "Logout"),
            (r"menu", "Menu"),
            (r"navigation", "Navigation"),
        ],
    )
});

/// Scroll verbs, applied to transcripts only.
static SCROLL_VERB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bscroll(?:s|ed|ing)?\b(?:\s+(?:down|up|through))?(?:\s+(?:the|this))?(?:\s+(list|page|results|feed|table|menu))?")
        .unwrap_or_else(|e| panic!("invalid scroll pattern: {}", e))
});

/// "Capitalized word followed by button".
static GENERIC_BUTTON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z][A-Za-z]+)\s+(?:[Bb]utton|BUTTON|[Bb]tn)\b")
        .unwrap_or_else(|e| panic!("invalid button pattern: {}", e))
});

static EMAIL_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)+\b")
        .unwrap_or_else(|e| panic!("invalid email pattern: {}", e))
});

static TWO_CAPITALIZED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z][a-z]+)\s+([A-Z][a-z]+)\b")
        .unwrap_or_else(|e| panic!("invalid field pattern: {}", e))
});

/// Words that belong to a table (or name a widget) and so never form a
/// free-standing two-word field label.
static KNOWN_KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    let mut words = vec![
        "button", "btn", "field", "login", "log", "sign", "in", "out", "user", "pass", "logout",
        "username", "password", "email", "screen", "page",
    ];
    for (_, rules) in [&*BUTTONS, &*FIELDS, &*LABELS] {
        for rule in rules {
            words.push(rule.label);
        }
    }
    words
});

fn is_known_keyword(word: &str) -> bool {
    KNOWN_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(word))
}

/// Target used when the only sampled frame matched nothing.
pub const PLACEHOLDER_TARGET: &str = "Application";

/// Buttons, fields, labels and the merged timeline for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeuristicsReport {
    /// e.g. "Login button"
    pub buttons: Vec<String>,
    /// e.g. "Username field"
    pub fields: Vec<String>,
    /// e.g. "Dashboard"
    pub labels: Vec<String>,
    pub events: Vec<InteractionEvent>,
}

impl HeuristicsReport {
    /// Build a report from an already merged, ordered event list.
    pub fn from_events(events: Vec<InteractionEvent>) -> Self {
        let collect = |kind: InteractionKind| {
            events
                .iter()
                .filter(|e| e.kind == kind)
                .map(InteractionEvent::display_label)
                .collect::<Vec<_>>()
        };
        Self {
            buttons: collect(InteractionKind::Click),
            fields: collect(InteractionKind::Type),
            labels: collect(InteractionKind::Navigate),
            events,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

fn event(timestamp_secs: f64, kind: InteractionKind, target: &str, raw: &str) -> InteractionEvent {
    InteractionEvent {
        timestamp_secs,
        kind,
        target: target.to_string(),
        raw: raw.to_string(),
    }
}

/// Scan one text fragment with every table. Events come back in the order
/// their matches appear in the text.
pub fn scan_text(text: &str, timestamp_secs: f64, include_scroll: bool) -> Vec<InteractionEvent> {
    let mut found: Vec<(usize, InteractionEvent)> = Vec::new();

    for (kind, rules) in [&*BUTTONS, &*FIELDS, &*LABELS] {
        for rule in rules {
            for m in rule.pattern.find_iter(text) {
                found.push((m.start(), event(timestamp_secs, *kind, rule.label, m.as_str())));
            }
        }
    }

    for caps in GENERIC_BUTTON.captures_iter(text) {
        if let (Some(whole), Some(word)) = (caps.get(0), caps.get(1)) {
            found.push((
                whole.start(),
                event(timestamp_secs, InteractionKind::Click, word.as_str(), whole.as_str()),
            ));
        }
    }

    for m in EMAIL_TOKEN.find_iter(text) {
        found.push((m.start(), event(timestamp_secs, InteractionKind::Type, "Email", m.as_str())));
    }

    for caps in TWO_CAPITALIZED.captures_iter(text) {
        if let (Some(whole), Some(first), Some(second)) = (caps.get(0), caps.get(1), caps.get(2)) {
            if !is_known_keyword(first.as_str()) && !is_known_keyword(second.as_str()) {
                let target = format!("{} {}", first.as_str(), second.as_str());
                found.push((
                    whole.start(),
                    event(timestamp_secs, InteractionKind::Type, &target, whole.as_str()),
                ));
            }
        }
    }

    if include_scroll {
        for caps in SCROLL_VERB.captures_iter(text) {
            if let Some(whole) = caps.get(0) {
                let target = caps
                    .get(1)
                    .map(|m| m.as_str().to_lowercase())
                    .unwrap_or_else(|| "page".to_string());
                found.push((
                    whole.start(),
                    event(timestamp_secs, InteractionKind::Scroll, &target, whole.as_str()),
                ));
            }
        }
    }

    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, e)| e).collect()
}

/// Sort by timestamp (stable, so match order survives ties) and keep the
/// earliest occurrence of each normalized label.
pub fn merge_events(mut events: Vec<InteractionEvent>) -> Vec<InteractionEvent> {
    events.sort_by(|a, b| a.timestamp_secs.total_cmp(&b.timestamp_secs));
    let mut seen = std::collections::HashSet::new();
    events.retain(|e| seen.insert(e.normalized_key()));
    events
}

/// Build the full report from OCR'd frames and an optional transcript.
pub fn build_report(frames: &[Frame], transcript: Option<&Transcript>) -> HeuristicsReport {
    let mut events = Vec::new();
    let only_frame = frames.len() == 1;

    for frame in frames {
        let text = frame.text.as_deref().unwrap_or_default();
        let found = scan_text(text, frame.timestamp_secs, false);
        if found.is_empty() && only_frame {
            events.push(event(
                frame.timestamp_secs,
                InteractionKind::Navigate,
                PLACEHOLDER_TARGET,
                text,
            ));
        }
        events.extend(found);
    }

    if let Some(t) = transcript.filter(|t| t.source != TranscriptSource::Placeholder) {
        if t.segments.is_empty() {
            events.extend(scan_text(&t.text, 0.0, true));
        } else {
            for segment in &t.segments {
                events.extend(scan_text(&segment.text, segment.start_secs, true));
            }
        }
    }

    HeuristicsReport::from_events(merge_events(events))
}

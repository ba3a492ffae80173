//! Terminal rendering of results and events.

use std::fmt::Write;
use truthguard::{PollEvent, ResultRecord};

/// Render a result record for the terminal.
pub fn render_record(record: &ResultRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Verdict:    {}", record.verdict.label());
    let _ = writeln!(out, "Confidence: {}%", record.confidence);
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", record.analysis.trim());

    if !record.sources.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Sources ({} verified of {}):",
            record.verified_sources(),
            record.sources.len()
        );
        for source in &record.sources {
            let mark = if source.verified { "✓" } else { " " };
            let _ = writeln!(out, "  [{mark}] {} <{}>", source.title, source.url);
        }
    }
    out
}

/// One-line progress message for an event, if it is worth printing.
pub fn render_event(event: &PollEvent) -> Option<String> {
    match event {
        PollEvent::SessionStarted { request_id } => {
            Some(format!("Waiting for the verdict on {request_id}..."))
        }
        PollEvent::NoResultYet { attempt, .. } => Some(format!("  attempt {attempt}: no result yet")),
        PollEvent::TransientError {
            attempt, message, ..
        } => Some(format!("  attempt {attempt}: {message}")),
        PollEvent::TimedOut { message, .. }
        | PollEvent::Failed { message, .. }
        | PollEvent::SubmissionFailed { message } => Some(message.clone()),
        PollEvent::Cancelled { request_id } => Some(format!("Stopped polling {request_id}.")),
        PollEvent::Succeeded { .. } => None,
    }
}

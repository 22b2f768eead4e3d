//! Human-readable lines for search events.

use std::fmt;

use serde::Serialize;

use crate::model::FunctionRef;
use crate::search::SearchEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportLevel {
    Info,
    Warn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportLine {
    pub level: ReportLevel,
    pub text: String,
}

impl ReportLine {
    fn info(text: String) -> Self {
        Self { level: ReportLevel::Info, text }
    }

    fn warn(text: String) -> Self {
        Self { level: ReportLevel::Warn, text }
    }
}

impl fmt::Display for ReportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// `0x`-prefixed, zero-padded to eight digits; wider addresses keep every digit.
pub fn format_address(address: u64) -> String {
    format!("0x{address:08x}")
}

pub fn candidate_count_line(count: usize) -> ReportLine {
    ReportLine::info(format!("Searching through {count} functions.."))
}

pub fn matches_line(function: &FunctionRef, count: usize) -> ReportLine {
    ReportLine::info(format!(
        "{count} matches in {} @ {}",
        function.name,
        format_address(function.address)
    ))
}

pub fn decompilation_failed_line(function: &FunctionRef) -> ReportLine {
    ReportLine::warn(format!(
        "Decompilation failed for {} @ {}. Skipping..",
        function.name,
        format_address(function.address)
    ))
}

pub fn no_targets_line(identifiers: &[String]) -> ReportLine {
    ReportLine::warn(format!(
        "No identifier in the query resolves to a function ({}); nothing to search",
        identifiers.join(", ")
    ))
}

pub fn cancelled_line(remaining: usize) -> ReportLine {
    ReportLine::warn(format!("Search cancelled; {remaining} functions not searched"))
}

/// Lines for one event. Rendered match snippets follow their count line.
pub fn lines_for(event: &SearchEvent) -> Vec<ReportLine> {
    match event {
        SearchEvent::NoTargets { identifiers } => vec![no_targets_line(identifiers)],
        SearchEvent::CandidateCount { count } => vec![candidate_count_line(*count)],
        SearchEvent::Matches { function, count, snippets } => {
            let mut lines = vec![matches_line(function, *count)];
            lines.extend(snippets.iter().map(|s| ReportLine::info(s.clone())));
            lines
        }
        SearchEvent::DecompilationFailed { function, .. } => {
            vec![decompilation_failed_line(function)]
        }
        SearchEvent::Cancelled { remaining } => vec![cancelled_line(*remaining)],
    }
}

//! End-to-end search: parse, narrow, decompile, match, report.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rayon::prelude::*;
use serde::Serialize;

use crate::error::SearchError;
use crate::host::HostAdapter;
use crate::model::{CandidateSet, Dialect, FunctionRef};
use crate::narrow::{CandidateNarrower, FunctionFilter};
use crate::query::{ContextLines, QueryFrontend};
use crate::report::{lines_for, ReportLevel};

/// One search invocation as a front end describes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub pattern: String,
    pub dialect: Dialect,
    pub colorize: bool,
    /// Render every match, not just the per-function count.
    pub print_full: bool,
}

impl SearchRequest {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self { pattern: pattern.into(), dialect: Dialect::C, colorize: false, print_full: false }
    }
}

/// Knobs that stay fixed across queries.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub filter: FunctionFilter,
    pub context: ContextLines,
    /// Drop matches where two variables bind the same text.
    pub unique: bool,
    /// Keep at most one match per function.
    pub first_match_only: bool,
    /// Worker threads; 0 and 1 both mean sequential.
    pub jobs: usize,
    /// Search every function when no identifier resolves.
    pub scan_all_when_unresolved: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            filter: FunctionFilter::default(),
            context: ContextLines::default(),
            unique: false,
            first_match_only: false,
            jobs: 1,
            scan_all_when_unresolved: false,
        }
    }
}

/// Cooperative cancellation, checked before each candidate.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SearchEvent {
    NoTargets { identifiers: Vec<String> },
    CandidateCount { count: usize },
    Matches { function: FunctionRef, count: usize, snippets: Vec<String> },
    DecompilationFailed { function: FunctionRef, reason: String },
    Cancelled { remaining: usize },
}

/// Destination for search events.
pub trait ReportSink {
    fn emit(&mut self, event: &SearchEvent);
}

/// Writes report lines to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn emit(&mut self, event: &SearchEvent) {
        for line in lines_for(event) {
            match line.level {
                ReportLevel::Info => log::info!("{line}"),
                ReportLevel::Warn => log::warn!("{line}"),
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    pub events: Vec<SearchEvent>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.events.iter().flat_map(lines_for).map(|l| l.text).collect()
    }
}

impl ReportSink for CollectingSink {
    fn emit(&mut self, event: &SearchEvent) {
        self.events.push(event.clone());
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionHit {
    pub function: FunctionRef,
    pub count: usize,
}

/// What a search did, alongside the emitted events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchSummary {
    pub identifiers: Vec<String>,
    pub resolved: Vec<FunctionRef>,
    /// False when nothing resolved and the candidates (if any) are the full
    /// function list.
    pub narrowed: bool,
    pub candidates: usize,
    pub searched: usize,
    /// Functions with at least one match, by address.
    pub hits: Vec<FunctionHit>,
    pub failures: Vec<FunctionRef>,
    pub cancelled: bool,
    pub not_searched: usize,
}

impl SearchSummary {
    pub fn total_matches(&self) -> usize {
        self.hits.iter().map(|h| h.count).sum()
    }
}

enum Outcome {
    Searched { count: usize, snippets: Vec<String> },
    Failed(String),
    Skipped,
}

/// Drives one query over a host, narrowing first.
pub struct SearchOrchestrator<'a, H: HostAdapter + ?Sized, Q: QueryFrontend> {
    host: &'a H,
    frontend: &'a Q,
    options: SearchOptions,
    cancel: CancellationToken,
}

impl<'a, H: HostAdapter + ?Sized, Q: QueryFrontend> SearchOrchestrator<'a, H, Q> {
    pub fn new(host: &'a H, frontend: &'a Q, options: SearchOptions) -> Self {
        Self { host, frontend, options, cancel: CancellationToken::new() }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Candidates the query would search, without decompiling anything.
    ///
    /// `None` when no identifier resolves and the full-scan fallback is off.
    pub fn candidates(
        &self,
        query: &Q::Query,
    ) -> (Vec<String>, Vec<FunctionRef>, Option<CandidateSet>) {
        let identifiers = self.frontend.identifiers(query);
        let narrowing = CandidateNarrower::new(self.host).narrow(&identifiers);
        let mut candidates = match narrowing.candidates {
            Some(set) => Some(set),
            None if self.options.scan_all_when_unresolved => {
                log::info!("no identifier resolves; scanning all functions");
                Some(self.host.functions().into_iter().collect())
            }
            None => None,
        };
        if let Some(set) = candidates.as_mut() {
            self.options.filter.apply(set);
        }
        (identifiers, narrowing.resolved, candidates)
    }

    /// Parse `request.pattern` and search every candidate, emitting events to
    /// `sink`. Only query and setup errors are returned; per-function
    /// failures become [`SearchEvent::DecompilationFailed`].
    pub fn run_query(
        &self,
        request: &SearchRequest,
        sink: &mut dyn ReportSink,
    ) -> Result<SearchSummary, SearchError> {
        let query = self.frontend.parse(&request.pattern, request.dialect)?;
        let (identifiers, resolved, candidates) = self.candidates(&query);
        let mut summary = SearchSummary {
            identifiers: identifiers.clone(),
            narrowed: !resolved.is_empty(),
            resolved,
            ..SearchSummary::default()
        };

        let Some(candidates) = candidates else {
            sink.emit(&SearchEvent::NoTargets { identifiers });
            return Ok(summary);
        };

        summary.candidates = candidates.len();
        sink.emit(&SearchEvent::CandidateCount { count: candidates.len() });
        let work = candidates.into_vec();

        if self.options.jobs <= 1 {
            for function in &work {
                let outcome = self.search_one(&query, &identifiers, function, request, None);
                record(&mut summary, sink, function, outcome);
            }
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.options.jobs)
                .build()
                .map_err(|e| SearchError::WorkerPool(e.to_string()))?;
            let session = Mutex::new(());
            let outcomes: Vec<Outcome> = pool.install(|| {
                work.par_iter()
                    .map(|f| self.search_one(&query, &identifiers, f, request, Some(&session)))
                    .collect()
            });
            for (function, outcome) in work.iter().zip(outcomes) {
                record(&mut summary, sink, function, outcome);
            }
        }

        if summary.not_searched > 0 {
            summary.cancelled = true;
            sink.emit(&SearchEvent::Cancelled { remaining: summary.not_searched });
        }
        summary.hits.sort_by_key(|h| h.function.address);
        summary.failures.sort_by_key(|f| f.address);
        log::info!(
            "{} matches in {} of {} searched functions",
            summary.total_matches(),
            summary.hits.len(),
            summary.searched
        );
        Ok(summary)
    }

    fn search_one(
        &self,
        query: &Q::Query,
        identifiers: &[String],
        function: &FunctionRef,
        request: &SearchRequest,
        session: Option<&Mutex<()>>,
    ) -> Outcome {
        if self.cancel.is_cancelled() {
            return Outcome::Skipped;
        }

        let decompiled = {
            let _guard = session.map(|m| m.lock());
            self.host.decompile(function)
        };
        let text = match decompiled {
            Ok(text) => text,
            Err(e) => {
                log::warn!("{e}");
                return Outcome::Failed(e.to_string());
            }
        };

        if let Some(missing) = identifiers.iter().find(|i| !text.contains(i.as_str())) {
            log::trace!("{function}: no `{missing}` in text, skipping matcher");
            return Outcome::Searched { count: 0, snippets: Vec::new() };
        }

        let mut matches = self.frontend.find_matches(query, &text);
        if self.options.unique {
            matches.retain(|m| m.has_unique_bindings(&text));
        }
        if self.options.first_match_only {
            matches.truncate(1);
        }

        let snippets = if request.print_full {
            matches
                .iter()
                .map(|m| {
                    self.frontend.display_with_context(
                        m,
                        &text,
                        self.options.context,
                        request.colorize,
                    )
                })
                .collect()
        } else {
            Vec::new()
        };
        Outcome::Searched { count: matches.len(), snippets }
    }
}

fn record(
    summary: &mut SearchSummary,
    sink: &mut dyn ReportSink,
    function: &FunctionRef,
    outcome: Outcome,
) {
    match outcome {
        Outcome::Searched { count, snippets } => {
            summary.searched += 1;
            if count > 0 {
                summary.hits.push(FunctionHit { function: function.clone(), count });
                sink.emit(&SearchEvent::Matches { function: function.clone(), count, snippets });
            }
        }
        Outcome::Failed(reason) => {
            summary.searched += 1;
            summary.failures.push(function.clone());
            sink.emit(&SearchEvent::DecompilationFailed { function: function.clone(), reason });
        }
        Outcome::Skipped => summary.not_searched += 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn collecting_sink_renders_lines() {
        let mut sink = CollectingSink::new();
        sink.emit(&SearchEvent::CandidateCount { count: 2 });
        sink.emit(&SearchEvent::Cancelled { remaining: 1 });
        assert_eq!(
            sink.lines(),
            vec!["Searching through 2 functions..", "Search cancelled; 1 functions not searched"]
        );
    }

    #[test]
    fn events_serialize_with_tag() {
        let json = serde_json::to_value(SearchEvent::CandidateCount { count: 3 }).unwrap();
        assert_eq!(json, serde_json::json!({"event": "candidate_count", "count": 3}));
    }
}

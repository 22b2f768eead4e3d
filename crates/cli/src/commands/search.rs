use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use pseudogrep_core::query::ContextLines;
use pseudogrep_core::report::{lines_for, no_targets_line};
use pseudogrep_core::search::CollectingSink;
use pseudogrep_core::{
    Dialect, FunctionFilter, FunctionRef, QueryFrontend, ReportSink, SearchError, SearchEvent,
    SearchOptions, SearchOrchestrator, SearchRequest, SearchSummary,
};

use crate::commands::util::{build_frontend, load_search_config, open_binary};

/// Everything `search` and `candidates` accept on the command line.
#[derive(Debug, Clone, Default)]
pub struct SearchArgs {
    pub pattern: String,
    pub binary: String,
    pub backend: Option<String>,
    pub config: Option<String>,
    pub cpp: bool,
    pub color: bool,
    pub print_matches: bool,
    pub before: Option<usize>,
    pub after: Option<usize>,
    pub limit: bool,
    pub unique: bool,
    pub regex: Vec<String>,
    pub force: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub jobs: Option<usize>,
    pub scan_all: bool,
    pub json: bool,
}

/// Prints report lines to stdout as events arrive.
pub struct ConsoleSink<W: Write> {
    out: W,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for ConsoleSink<W> {
    fn emit(&mut self, event: &SearchEvent) {
        for line in lines_for(event) {
            if let Err(e) = writeln!(self.out, "{line}") {
                log::error!("failed to write output: {e}");
                return;
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchReport {
    pub pattern: String,
    pub backend: String,
    pub binary: String,
    pub binary_sha256: Option<String>,
    pub started_at: String,
    pub finished_at: String,
    pub events: Vec<SearchEvent>,
    pub summary: SearchSummary,
}

#[derive(Debug, Serialize)]
pub struct CandidateReport {
    pub pattern: String,
    pub identifiers: Vec<String>,
    pub resolved: Vec<FunctionRef>,
    /// Absent when no identifier resolved to a function.
    pub candidates: Option<Vec<FunctionRef>>,
}

struct Prepared {
    binary: PathBuf,
    backend: String,
    host: Box<dyn pseudogrep_core::HostAdapter>,
    options: SearchOptions,
    dialect: Dialect,
}

fn prepare(args: &SearchArgs) -> Result<Prepared> {
    let config = load_search_config(args.config.as_deref())?;
    let binary = crate::canonicalize_or_current(&args.binary)?;
    let (kind, host) = open_binary(args.backend.as_deref(), &config, &binary)?;

    let filter =
        FunctionFilter::parse(&args.include, &args.exclude).context("Invalid function filter")?;
    let options = SearchOptions {
        filter,
        context: ContextLines {
            before: args.before.unwrap_or(config.before),
            after: args.after.unwrap_or(config.after),
        },
        unique: args.unique,
        first_match_only: args.limit,
        jobs: args.jobs.unwrap_or(config.jobs),
        scan_all_when_unresolved: args.scan_all,
    };
    Ok(Prepared {
        binary,
        backend: kind.to_string(),
        host,
        options,
        dialect: Dialect::from_cpp_flag(args.cpp || config.cpp),
    })
}

/// Turn a query syntax error into a user-facing error, printing the C++ hint
/// when it applies.
fn query_error(err: SearchError) -> anyhow::Error {
    if let SearchError::QuerySyntax { valid_in_cpp: true, .. } = &err {
        eprintln!("Note: This query is valid in C++ mode (--cpp)");
    }
    anyhow::Error::new(err).context("Query failed")
}

/// Run a pattern over the call-graph-narrowed functions of a binary.
pub fn search_command(args: &SearchArgs) -> Result<SearchSummary> {
    let started_at = Utc::now().to_rfc3339();
    let prepared = prepare(args)?;
    let frontend = build_frontend(args.force, &args.regex)?;
    let orchestrator =
        SearchOrchestrator::new(prepared.host.as_ref(), &frontend, prepared.options.clone());
    let request = SearchRequest {
        pattern: args.pattern.clone(),
        dialect: prepared.dialect,
        colorize: args.color && !args.json,
        print_full: args.print_matches,
    };

    if !args.json {
        let mut sink = ConsoleSink::new(io::stdout().lock());
        return orchestrator.run_query(&request, &mut sink).map_err(query_error);
    }

    let mut sink = CollectingSink::new();
    let summary = orchestrator.run_query(&request, &mut sink).map_err(query_error)?;
    let report = SearchReport {
        pattern: args.pattern.clone(),
        backend: prepared.backend,
        binary: prepared.binary.display().to_string(),
        binary_sha256: binary_hash(&prepared.binary),
        started_at,
        finished_at: Utc::now().to_rfc3339(),
        events: sink.events,
        summary: summary.clone(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(summary)
}

/// Print the functions a pattern would search, without decompiling.
pub fn candidates_command(args: &SearchArgs) -> Result<CandidateReport> {
    let prepared = prepare(args)?;
    let frontend = build_frontend(args.force, &args.regex)?;
    let query = frontend.parse(&args.pattern, prepared.dialect).map_err(query_error)?;
    let orchestrator = SearchOrchestrator::new(prepared.host.as_ref(), &frontend, prepared.options);
    let (identifiers, resolved, candidates) = orchestrator.candidates(&query);
    let report = CandidateReport {
        pattern: args.pattern.clone(),
        identifiers,
        resolved,
        candidates: candidates.map(|set| set.sorted()),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(report);
    }

    match &report.candidates {
        None => println!("{}", no_targets_line(&report.identifiers)),
        Some(list) => {
            println!("Candidates ({}):", list.len());
            for function in list {
                println!("- {function}");
            }
        }
    }
    Ok(report)
}

fn binary_hash(path: &Path) -> Option<String> {
    match crate::sha256_file(path) {
        Ok(hash) => Some(hash),
        Err(e) => {
            log::warn!("{e:#}");
            None
        }
    }
}

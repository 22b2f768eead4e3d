//! Structural query frontend.
//!
//! The matching engine is opaque to the rest of the crate: it parses a
//! pattern, lists the identifiers the pattern mentions, and finds matches in
//! a text body. Matches are copied into [`MatchResult`] so rendering and
//! filtering do not depend on the engine's types.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Range;

use regex::Regex;
use serde::Serialize;

use crate::error::SearchError;
use crate::model::Dialect;

pub mod engine;
pub mod render;

pub use self::engine::{WeggliFrontend, WeggliQuery};
pub use self::render::{render_match, ContextLines};

/// One located occurrence of a query inside a text body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    /// Byte offset of the enclosing function (or outermost matched node).
    pub start: usize,
    /// Byte range of the function definition holding the match, when the
    /// text parses into one.
    pub function: Option<Range<usize>>,
    /// Byte ranges of every captured node, in engine order.
    pub spans: Vec<Range<usize>>,
    /// Byte range bound to each `$variable`.
    pub vars: BTreeMap<String, Range<usize>>,
}

impl MatchResult {
    /// Text bound to `var` in `source`.
    pub fn value<'s>(&self, var: &str, source: &'s str) -> Option<&'s str> {
        self.vars.get(var).and_then(|r| source.get(r.clone()))
    }

    /// True when no two variables are bound to the same text.
    pub fn has_unique_bindings(&self, source: &str) -> bool {
        let mut seen = HashSet::new();
        self.vars.keys().filter_map(|k| self.value(k, source)).all(|v| seen.insert(v))
    }
}

/// Capability surface of a structural matching engine.
pub trait QueryFrontend: Send + Sync {
    type Query: Send + Sync;

    /// Parse `pattern`; malformed patterns fail with `SearchError::QuerySyntax`.
    fn parse(&self, pattern: &str, dialect: Dialect) -> Result<Self::Query, SearchError>;

    /// Identifier tokens the query references, in source order. May contain
    /// duplicates.
    fn identifiers(&self, query: &Self::Query) -> Vec<String>;

    /// All matches of `query` in `text`; empty when nothing matches or the
    /// text does not parse.
    fn find_matches(&self, query: &Self::Query, text: &str) -> Vec<MatchResult>;

    /// Render one match with default context.
    fn display(&self, result: &MatchResult, text: &str, colorize: bool) -> String {
        self.display_with_context(result, text, ContextLines::default(), colorize)
    }

    fn display_with_context(
        &self,
        result: &MatchResult,
        text: &str,
        context: ContextLines,
        colorize: bool,
    ) -> String {
        render_match(result, text, context, colorize)
    }
}

/// Regex constraints on query variables (`$x=regex` / `$x!=regex`).
#[derive(Debug, Clone, Default)]
pub struct VariableConstraints {
    entries: HashMap<String, (bool, Regex)>,
}

impl VariableConstraints {
    /// Parse `var=regex` arguments. A `!` before `=` negates the constraint and
    /// the `$` prefix is optional.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self, SearchError> {
        let mut entries = HashMap::new();
        for arg in args {
            let arg = arg.as_ref();
            let (var, raw_regex) = arg
                .split_once('=')
                .ok_or_else(|| SearchError::InvalidConstraint(arg.to_string()))?;
            let mut var = if var.starts_with('$') { var.to_string() } else { format!("${var}") };
            let negative = var.ends_with('!');
            if negative {
                var.pop();
            }
            if var.len() < 2 {
                return Err(SearchError::InvalidConstraint(arg.to_string()));
            }
            entries.insert(var, (negative, Regex::new(raw_regex)?));
        }
        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn variables(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn get(&self, var: &str) -> Option<&(bool, Regex)> {
        self.entries.get(var)
    }

    pub(crate) fn to_map(&self) -> HashMap<String, (bool, Regex)> {
        self.entries.clone()
    }
}

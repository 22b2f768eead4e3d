//! Call-graph narrowing of the search universe.
//!
//! Every query identifier that names a function in the binary is treated as
//! a call the matching code must contain, so only functions that directly
//! call all such targets are worth decompiling. This is a heuristic: an
//! identifier reused as a variable or type name narrows the search just the
//! same.

use std::collections::HashSet;

use regex::Regex;
use serde::Serialize;

use crate::host::HostAdapter;
use crate::model::{CandidateSet, FunctionRef};

/// Outcome of narrowing one identifier sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Narrowing {
    /// Functions the identifiers resolved to, first occurrence first.
    pub resolved: Vec<FunctionRef>,
    /// Identifiers that named no function.
    pub unresolved: Vec<String>,
    /// `None` when nothing resolved and no narrowing was possible.
    #[serde(skip)]
    pub candidates: Option<CandidateSet>,
}

impl Narrowing {
    pub fn candidate_count(&self) -> usize {
        self.candidates.as_ref().map_or(0, CandidateSet::len)
    }
}

/// Turns query identifiers into the set of functions calling every
/// referenced function.
pub struct CandidateNarrower<'a, H: HostAdapter + ?Sized> {
    host: &'a H,
}

impl<'a, H: HostAdapter + ?Sized> CandidateNarrower<'a, H> {
    pub fn new(host: &'a H) -> Self {
        Self { host }
    }

    pub fn narrow<S: AsRef<str>>(&self, identifiers: &[S]) -> Narrowing {
        let mut narrowing = Narrowing::default();
        let mut seen = HashSet::new();
        for ident in identifiers {
            let ident = ident.as_ref();
            match self.host.resolve_function(ident) {
                Some(function) => {
                    if seen.insert(function.address) {
                        narrowing.resolved.push(function);
                    }
                }
                None => narrowing.unresolved.push(ident.to_string()),
            }
        }

        if !narrowing.unresolved.is_empty() {
            log::debug!("identifiers without a function: {}", narrowing.unresolved.join(", "));
        }

        let Some((seed, rest)) = narrowing.resolved.split_first() else {
            return narrowing;
        };

        let mut candidates: CandidateSet = self.host.callers_of(seed).into_iter().collect();
        log::debug!("{} direct callers of {seed}", candidates.len());
        for target in rest {
            if candidates.is_empty() {
                break;
            }
            candidates.intersect_with(self.host.callers_of(target));
            log::debug!("{} candidates left after {target}", candidates.len());
        }

        narrowing.candidates = Some(candidates);
        narrowing
    }
}

/// Name filters applied to candidates (`--include` / `--exclude`).
///
/// With include patterns present a function must match at least one of
/// them. A function matching any exclude pattern is always dropped.
#[derive(Debug, Clone, Default)]
pub struct FunctionFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl FunctionFilter {
    pub fn new(include: Vec<Regex>, exclude: Vec<Regex>) -> Self {
        Self { include, exclude }
    }

    pub fn parse<S: AsRef<str>>(include: &[S], exclude: &[S]) -> Result<Self, regex::Error> {
        let compile = |patterns: &[S]| {
            patterns.iter().map(|p| Regex::new(p.as_ref())).collect::<Result<Vec<_>, _>>()
        };
        Ok(Self { include: compile(include)?, exclude: compile(exclude)? })
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    pub fn allows(&self, function: &FunctionRef) -> bool {
        if self.exclude.iter().any(|re| re.is_match(&function.name)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|re| re.is_match(&function.name))
    }

    pub fn apply(&self, candidates: &mut CandidateSet) {
        if !self.is_empty() {
            candidates.retain(|f| self.allows(f));
        }
    }
}

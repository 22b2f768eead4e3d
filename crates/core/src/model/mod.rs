//! Core data model shared by hosts, the narrower and the orchestrator.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Handle to a function inside the analysed binary.
///
/// Hosts produce these; the core only stores and compares them. Identity is
/// the entry address, the name is for display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionRef {
    pub address: u64,
    pub name: String,
}

impl FunctionRef {
    pub fn new(address: u64, name: impl Into<String>) -> Self {
        Self { address, name: name.into() }
    }
}

impl fmt::Display for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ 0x{:08x}", self.name, self.address)
    }
}

/// Source language variant used both for parsing the pattern and the
/// decompiled text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    C,
    Cpp,
}

impl Dialect {
    pub fn from_cpp_flag(cpp: bool) -> Self {
        if cpp {
            Dialect::Cpp
        } else {
            Dialect::C
        }
    }

    pub fn is_cpp(self) -> bool {
        matches!(self, Dialect::Cpp)
    }
}

/// Narrowed search universe: unique functions keyed by entry address.
///
/// Membership and intersection always go through the address, never the
/// name, so overloaded names stay distinct.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet {
    members: HashMap<u64, FunctionRef>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self { members: HashMap::new() }
    }

    pub fn insert(&mut self, function: FunctionRef) {
        self.members.entry(function.address).or_insert(function);
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, function: &FunctionRef) -> bool {
        self.members.contains_key(&function.address)
    }

    pub fn contains_address(&self, address: u64) -> bool {
        self.members.contains_key(&address)
    }

    /// Keep only members that also appear in `other`.
    pub fn intersect_with<I>(&mut self, other: I)
    where
        I: IntoIterator<Item = FunctionRef>,
    {
        let keep: HashSet<u64> = other.into_iter().map(|f| f.address).collect();
        self.members.retain(|address, _| keep.contains(address));
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&FunctionRef) -> bool,
    {
        self.members.retain(|_, function| keep(function));
    }

    /// Iterate members in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &FunctionRef> {
        self.members.values()
    }

    /// Members sorted by address, for stable listings.
    pub fn sorted(&self) -> Vec<FunctionRef> {
        let mut out: Vec<FunctionRef> = self.members.values().cloned().collect();
        out.sort_by_key(|f| f.address);
        out
    }

    pub fn into_vec(self) -> Vec<FunctionRef> {
        self.members.into_values().collect()
    }
}

impl FromIterator<FunctionRef> for CandidateSet {
    fn from_iter<T: IntoIterator<Item = FunctionRef>>(iter: T) -> Self {
        let mut set = CandidateSet::new();
        for function in iter {
            set.insert(function);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_compares_addresses_not_names() {
        let mut set: CandidateSet =
            [FunctionRef::new(0x10, "dup"), FunctionRef::new(0x20, "dup")].into_iter().collect();
        set.intersect_with([FunctionRef::new(0x20, "renamed")]);
        assert_eq!(set.len(), 1);
        assert!(set.contains_address(0x20));
        assert_eq!(set.sorted()[0].name, "dup");
    }

    #[test]
    fn duplicate_inserts_keep_one_member() {
        let set: CandidateSet =
            [FunctionRef::new(1, "a"), FunctionRef::new(1, "a")].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn dialect_from_flag() {
        assert_eq!(Dialect::from_cpp_flag(true), Dialect::Cpp);
        assert!(!Dialect::from_cpp_flag(false).is_cpp());
    }
}

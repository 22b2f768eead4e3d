use std::collections::{HashMap, HashSet};

use crate::model::FunctionRef;

/// Call edge between two function entry addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallEdge {
    pub from: u64,
    pub to: u64,
}

/// In-memory call graph indexed by callee, shared by the backends.
#[derive(Debug, Clone, Default)]
pub struct CallGraph {
    functions: HashMap<u64, FunctionRef>,
    by_name: HashMap<String, u64>,
    callers: HashMap<u64, HashSet<u64>>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function. The first function registered under a name wins
    /// name lookups; later ones stay reachable by address.
    pub fn add_function(&mut self, function: FunctionRef) {
        self.by_name.entry(function.name.clone()).or_insert(function.address);
        self.functions.insert(function.address, function);
    }

    pub fn add_call(&mut self, edge: CallEdge) {
        self.callers.entry(edge.to).or_default().insert(edge.from);
    }

    pub fn by_name(&self, name: &str) -> Option<&FunctionRef> {
        self.by_name.get(name).and_then(|address| self.functions.get(address))
    }

    /// Known functions with a direct call to `address`. Call sites outside
    /// any known function are dropped.
    pub fn callers_of(&self, address: u64) -> Vec<FunctionRef> {
        self.callers
            .get(&address)
            .map(|from| from.iter().filter_map(|a| self.functions.get(a)).cloned().collect())
            .unwrap_or_default()
    }

    pub fn functions(&self) -> Vec<FunctionRef> {
        self.functions.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callers_skip_unknown_call_sites() {
        let mut graph = CallGraph::new();
        graph.add_function(FunctionRef::new(0x10, "caller"));
        graph.add_function(FunctionRef::new(0x20, "callee"));
        graph.add_call(CallEdge { from: 0x10, to: 0x20 });
        graph.add_call(CallEdge { from: 0x10, to: 0x20 });
        graph.add_call(CallEdge { from: 0x99, to: 0x20 });

        let callers = graph.callers_of(0x20);
        assert_eq!(callers, vec![FunctionRef::new(0x10, "caller")]);
        assert!(graph.callers_of(0x10).is_empty());
    }

    #[test]
    fn first_name_wins_lookup() {
        let mut graph = CallGraph::new();
        graph.add_function(FunctionRef::new(0x10, "dup"));
        graph.add_function(FunctionRef::new(0x20, "dup"));
        assert_eq!(graph.by_name("dup").map(|f| f.address), Some(0x10));
        assert_eq!(graph.len(), 2);
    }
}

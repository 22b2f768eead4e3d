use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::is_yaml_path;
use crate::error::HostError;
use crate::host::{CallEdge, CallGraph, HostAdapter};
use crate::model::FunctionRef;

/// Exported view of a binary: functions, their direct calls and pseudocode.
///
/// Produced by a disassembler script or written by hand for tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<String>,
    #[serde(default)]
    pub functions: Vec<SnapshotFunction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFunction {
    pub address: u64,
    pub name: String,
    /// Direct call targets, by entry address or by function name.
    #[serde(default)]
    pub calls: Vec<CallTarget>,
    /// Decompiled text; absent when the exporter failed to decompile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pseudocode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CallTarget {
    Address(u64),
    Name(String),
}

/// Host backed by a [`Snapshot`] held in memory.
#[derive(Debug, Clone)]
pub struct SnapshotHost {
    source: Option<PathBuf>,
    graph: CallGraph,
    pseudocode: HashMap<u64, String>,
}

impl SnapshotHost {
    /// Read a JSON or YAML snapshot from disk.
    pub fn load(path: &Path) -> Result<Self, HostError> {
        if !path.is_file() {
            return Err(HostError::MissingBinary(path.to_path_buf()));
        }
        let snapshot_error =
            |reason: String| HostError::Snapshot { path: path.to_path_buf(), reason };
        let body = fs::read_to_string(path).map_err(|e| snapshot_error(e.to_string()))?;
        let snapshot: Snapshot = if is_yaml_path(path) {
            serde_yaml::from_str(&body).map_err(|e| snapshot_error(e.to_string()))?
        } else {
            serde_json::from_str(&body).map_err(|e| snapshot_error(e.to_string()))?
        };
        let mut host = Self::from_snapshot(snapshot).map_err(|e| match e {
            HostError::Snapshot { reason, .. } => snapshot_error(reason),
            other => other,
        })?;
        host.source = Some(path.to_path_buf());
        Ok(host)
    }

    /// Index an in-memory snapshot. Calls naming an unknown function are an error.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, HostError> {
        let mut graph = CallGraph::new();
        let mut pseudocode = HashMap::new();
        for f in &snapshot.functions {
            graph.add_function(FunctionRef::new(f.address, f.name.clone()));
            if let Some(text) = &f.pseudocode {
                pseudocode.insert(f.address, text.clone());
            }
        }

        for f in &snapshot.functions {
            for target in &f.calls {
                let to = match target {
                    CallTarget::Address(address) => *address,
                    CallTarget::Name(name) => graph
                        .by_name(name)
                        .map(|callee| callee.address)
                        .ok_or_else(|| HostError::Snapshot {
                            path: PathBuf::new(),
                            reason: format!("{} calls unknown function '{}'", f.name, name),
                        })?,
                };
                graph.add_call(CallEdge { from: f.address, to });
            }
        }

        log::debug!(
            "snapshot {}: {} functions, {} with pseudocode",
            snapshot.binary.as_deref().unwrap_or("<unnamed>"),
            graph.len(),
            pseudocode.len()
        );
        Ok(Self { source: None, graph, pseudocode })
    }

    /// Path the snapshot was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

impl HostAdapter for SnapshotHost {
    fn name(&self) -> &str {
        "snapshot"
    }

    fn resolve_function(&self, name: &str) -> Option<FunctionRef> {
        self.graph.by_name(name).cloned()
    }

    fn callers_of(&self, function: &FunctionRef) -> Vec<FunctionRef> {
        self.graph.callers_of(function.address)
    }

    fn decompile(&self, function: &FunctionRef) -> Result<String, HostError> {
        self.pseudocode.get(&function.address).cloned().ok_or_else(|| HostError::Decompilation {
            name: function.name.clone(),
            address: function.address,
            reason: "no pseudocode in snapshot".to_string(),
        })
    }

    fn functions(&self) -> Vec<FunctionRef> {
        self.graph.functions()
    }
}

//! Host backends: the capability surface over a loaded binary.
//!
//! A host resolves functions by name, lists the direct callers of a
//! function and decompiles functions to text. Backends load their call graph
//! when opened, so lookups are in-memory and infallible afterwards; only
//! decompilation can fail per function.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::config::SearchConfig;
use crate::error::HostError;
use crate::model::FunctionRef;

mod graph;
#[cfg(feature = "rizin-backend")]
pub mod rizin;
pub mod snapshot;

pub use graph::{CallEdge, CallGraph};

#[cfg(feature = "rizin-backend")]
pub use rizin::RizinHost;
pub use snapshot::SnapshotHost;

/// Capability object over one analysed binary.
///
/// Implementations are shared across worker threads, but the orchestrator
/// never calls `decompile` from two threads at once.
pub trait HostAdapter: Send + Sync {
    /// Human-readable backend name.
    fn name(&self) -> &str;

    /// Look up a function by exact (or backend-normalized) name.
    fn resolve_function(&self, name: &str) -> Option<FunctionRef>;

    /// Functions containing at least one direct call to `function`'s entry.
    fn callers_of(&self, function: &FunctionRef) -> Vec<FunctionRef>;

    /// Decompiled pseudocode for `function`.
    fn decompile(&self, function: &FunctionRef) -> Result<String, HostError>;

    /// Every function the host knows about.
    fn functions(&self) -> Vec<FunctionRef>;
}

/// Backends that can be opened by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKind {
    Snapshot,
    #[cfg(feature = "rizin-backend")]
    Rizin,
}

impl HostKind {
    /// All compiled-in backends.
    pub fn all() -> Vec<HostKind> {
        vec![
            HostKind::Snapshot,
            #[cfg(feature = "rizin-backend")]
            HostKind::Rizin,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HostKind::Snapshot => "snapshot",
            #[cfg(feature = "rizin-backend")]
            HostKind::Rizin => "rizin",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            HostKind::Snapshot => {
                "Exported call graph + pseudocode (JSON/YAML); no external tools needed"
            }
            #[cfg(feature = "rizin-backend")]
            HostKind::Rizin => "rizin analysis with rz-ghidra (pdg) or pdc decompilation",
        }
    }

    /// Guess a backend from the input path: exported snapshots are JSON/YAML,
    /// anything else is treated as a raw binary.
    pub fn infer(path: &Path) -> HostKind {
        let is_snapshot = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("json") | Some("yaml") | Some("yml")
        );
        if is_snapshot {
            return HostKind::Snapshot;
        }
        #[cfg(feature = "rizin-backend")]
        {
            HostKind::Rizin
        }
        #[cfg(not(feature = "rizin-backend"))]
        {
            HostKind::Snapshot
        }
    }
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostKind {
    type Err = HostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HostKind::all()
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| HostError::MissingBackend(s.to_string()))
    }
}

/// Open `path` with the selected backend.
#[cfg_attr(not(feature = "rizin-backend"), allow(unused_variables))]
pub fn open_host(
    kind: HostKind,
    path: &Path,
    config: &SearchConfig,
) -> Result<Box<dyn HostAdapter>, HostError> {
    log::info!("opening {} with the {} backend", path.display(), kind);
    match kind {
        HostKind::Snapshot => Ok(Box::new(SnapshotHost::load(path)?)),
        #[cfg(feature = "rizin-backend")]
        HostKind::Rizin => Ok(Box::new(RizinHost::open(path, &config.backends)?)),
    }
}

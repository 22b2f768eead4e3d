//! pseudogrep-core
//!
//! Core library for structural search over decompiled binaries.
//!
//! A search takes a structural pattern, pulls out the names it references,
//! uses the binary's call graph to keep only functions that call every
//! referenced function, and runs the matcher over the decompiled text of
//! those candidates alone.
//!
//! All substantive logic lives here so it is fully testable and reusable
//! from multiple frontends (CLI, disassembler plugins, etc.).

pub mod config;
pub mod error;
pub mod host;
pub mod model;
pub mod narrow;
pub mod query;
pub mod report;
pub mod search;

pub use error::{HostError, SearchError};
pub use host::HostAdapter;
pub use model::{CandidateSet, Dialect, FunctionRef};
pub use narrow::{CandidateNarrower, FunctionFilter, Narrowing};
pub use query::{MatchResult, QueryFrontend};
pub use search::{
    CancellationToken, ReportSink, SearchEvent, SearchOptions, SearchOrchestrator, SearchRequest,
    SearchSummary,
};

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

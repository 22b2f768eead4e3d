use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;

use crate::config::BackendPaths;
use crate::error::HostError;
use crate::host::{CallEdge, CallGraph, HostAdapter};
use crate::model::FunctionRef;

/// rizin command used when the config does not name one (rz-ghidra).
pub const DEFAULT_DECOMPILE_COMMAND: &str = "pdg";

/// Flag prefixes rizin puts in front of symbol names.
const NAME_PREFIXES: &[&str] = &["sym.imp.", "sym.", "dbg.", "fcn.", "imp."];

/// rizin-backed host that shells out to rizin/rz.
///
/// The function list and call references are read once with `aa;aflj`;
/// every decompilation is a separate rizin invocation.
#[derive(Debug)]
pub struct RizinHost {
    rizin_path: PathBuf,
    binary: PathBuf,
    decompile_command: String,
    version: String,
    graph: CallGraph,
}

impl RizinHost {
    /// Analyze `binary` and index its call graph.
    pub fn open(binary: &Path, paths: &BackendPaths) -> Result<Self, HostError> {
        if !binary.is_file() {
            return Err(HostError::MissingBinary(binary.to_path_buf()));
        }

        let rizin_path =
            paths.rizin.as_ref().map(PathBuf::from).unwrap_or_else(resolve_rizin_path);
        let version = version_string(&rizin_path).map_err(HostError::Backend)?;

        // Allow tests to feed synthetic JSON via env to avoid needing rizin installed.
        let listing = if let Some(fake_json) = std::env::var_os("PSEUDOGREP_RIZIN_FAKE_JSON") {
            fs::read_to_string(fake_json).map_err(|e| {
                HostError::Backend(format!("failed to read PSEUDOGREP_RIZIN_FAKE_JSON: {e}"))
            })?
        } else {
            run_rizin(&rizin_path, binary, "aa;aflj")?
        };

        let mut host = Self::from_listing(binary, &listing)?;
        host.rizin_path = rizin_path;
        host.version = version;
        if let Some(cmd) = &paths.rizin_decompile_command {
            host.decompile_command = cmd.clone();
        }
        log::info!("{}: {} functions ({})", binary.display(), host.graph.len(), host.version);
        Ok(host)
    }

    /// Build a host from an `aflj` listing without running rizin.
    pub fn from_listing(binary: &Path, aflj: &str) -> Result<Self, HostError> {
        Ok(Self {
            rizin_path: resolve_rizin_path(),
            binary: binary.to_path_buf(),
            decompile_command: DEFAULT_DECOMPILE_COMMAND.to_string(),
            version: String::new(),
            graph: parse_functions(aflj)?,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn decompile_command(&self) -> &str {
        &self.decompile_command
    }
}

impl HostAdapter for RizinHost {
    fn name(&self) -> &str {
        "rizin"
    }

    fn resolve_function(&self, name: &str) -> Option<FunctionRef> {
        if let Some(f) = self.graph.by_name(name) {
            return Some(f.clone());
        }
        NAME_PREFIXES
            .iter()
            .find_map(|prefix| self.graph.by_name(&format!("{prefix}{name}")).cloned())
    }

    fn callers_of(&self, function: &FunctionRef) -> Vec<FunctionRef> {
        self.graph.callers_of(function.address)
    }

    fn decompile(&self, function: &FunctionRef) -> Result<String, HostError> {
        let failed = |reason: String| HostError::Decompilation {
            name: function.name.clone(),
            address: function.address,
            reason,
        };

        let text = if let Some(dir) = std::env::var_os("PSEUDOGREP_RIZIN_FAKE_PSEUDOCODE_DIR") {
            let path = Path::new(&dir).join(format!("{:x}.c", function.address));
            fs::read_to_string(&path).map_err(|e| failed(format!("{}: {e}", path.display())))?
        } else {
            let command = format!(
                "af @ 0x{addr:x};{cmd} @ 0x{addr:x}",
                addr = function.address,
                cmd = self.decompile_command
            );
            run_rizin(&self.rizin_path, &self.binary, &command).map_err(|e| failed(e.to_string()))?
        };

        if text.trim().is_empty() {
            return Err(failed(format!("`{}` produced no output", self.decompile_command)));
        }
        Ok(text)
    }

    fn functions(&self) -> Vec<FunctionRef> {
        self.graph.functions()
    }
}

fn resolve_rizin_path() -> PathBuf {
    std::env::var_os("RIZIN_BIN").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("rizin"))
}

fn run_rizin(rizin_bin: &Path, binary: &Path, command: &str) -> Result<String, HostError> {
    log::debug!("rizin -c {command:?} {}", binary.display());
    let output = Command::new(rizin_bin)
        .args(["-2", "-q0", "-c", command])
        .arg(binary)
        .output()
        .map_err(|e| HostError::Backend(format!("failed to spawn rizin: {e}")))?;
    if !output.status.success() {
        return Err(HostError::Backend(format!("rizin exited with {}", output.status)));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

fn version_string(rizin_bin: &Path) -> Result<String, String> {
    if let Some(fake) = std::env::var_os("PSEUDOGREP_RIZIN_FAKE_VERSION") {
        return Ok(fake.to_string_lossy().to_string());
    }
    let output = Command::new(rizin_bin)
        .arg("-v")
        .output()
        .map_err(|e| format!("failed to spawn rizin: {e}"))?;
    if !output.status.success() {
        return Err(format!("rizin -v exited with {}", output.status));
    }
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if stdout.is_empty() {
        Err("rizin -v produced no output".to_string())
    } else {
        Ok(stdout)
    }
}

#[derive(Debug, Deserialize)]
struct RizinFunction {
    #[serde(default)]
    offset: Option<u64>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    callrefs: Option<Vec<RizinCallRef>>,
}

#[derive(Debug, Deserialize)]
struct RizinCallRef {
    #[serde(default)]
    addr: Option<u64>,
    #[serde(default)]
    #[serde(rename = "type")]
    typ: Option<String>,
}

impl RizinCallRef {
    fn is_call(&self) -> bool {
        matches!(self.typ.as_deref().map(str::to_ascii_uppercase).as_deref(), Some("C" | "CALL"))
    }
}

fn parse_functions(body: &str) -> Result<CallGraph, HostError> {
    // aflj on a binary without functions prints nothing at all.
    if body.trim().is_empty() {
        return Ok(CallGraph::new());
    }
    let funcs: Vec<RizinFunction> = serde_json::from_str(body)
        .map_err(|e| HostError::Backend(format!("failed to parse rizin JSON: {e}")))?;

    let mut graph = CallGraph::new();
    let mut edges = Vec::new();
    for f in funcs {
        let Some(from) = f.offset else { continue };
        let name = f.name.unwrap_or_else(|| format!("fcn.{from:08x}"));
        graph.add_function(FunctionRef::new(from, name));
        for cref in f.callrefs.unwrap_or_default() {
            if let (true, Some(to)) = (cref.is_call(), cref.addr) {
                edges.push(CallEdge { from, to });
            }
        }
    }
    for edge in edges {
        graph.add_call(edge);
    }
    Ok(graph)
}

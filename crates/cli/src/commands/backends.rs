use anyhow::Result;
use serde::Serialize;

use pseudogrep_core::host::HostKind;

#[derive(Debug, Serialize)]
pub struct BackendInfo {
    pub name: String,
    pub description: String,
}

/// Host backends compiled into this binary, sorted by name.
pub fn backend_infos() -> Vec<BackendInfo> {
    let mut entries: Vec<BackendInfo> = HostKind::all()
        .into_iter()
        .map(|kind| BackendInfo {
            name: kind.as_str().to_string(),
            description: kind.description().to_string(),
        })
        .collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    entries
}

/// List available host backends known to this binary.
pub fn list_backends_command(json: bool) -> Result<()> {
    let entries = backend_infos();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("Backends: (none)");
        return Ok(());
    }

    println!("Backends:");
    for entry in entries {
        println!("- {}: {}", entry.name, entry.description);
    }

    Ok(())
}

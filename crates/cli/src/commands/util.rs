use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};

use pseudogrep_core::config::{discover_config, SearchConfig};
use pseudogrep_core::host::{open_host, HostKind};
use pseudogrep_core::query::{VariableConstraints, WeggliFrontend};
use pseudogrep_core::HostAdapter;

/// Map repeated `-v` flags to a log level: warn, info, debug, trace.
pub fn log_level(verbosity: u8) -> log::LevelFilter {
    match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// Install env_logger at the level chosen by `-v`. Safe to call twice.
pub fn init_logging(verbosity: u8) {
    let _ = env_logger::Builder::new()
        .filter_level(log_level(verbosity))
        .format_timestamp(None)
        .try_init();
}

/// Load `--config` if given, else `.pseudogrep.json` from the working directory.
pub fn load_search_config(explicit: Option<&str>) -> Result<SearchConfig> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    discover_config(explicit.map(Path::new), &cwd)
}

/// Backend for `binary`: the flag, then the config default, then a guess from
/// the file extension.
pub fn resolve_backend(
    explicit: Option<&str>,
    config: &SearchConfig,
    binary: &Path,
) -> Result<HostKind> {
    match explicit.or(config.default_backend.as_deref()) {
        Some(name) => HostKind::from_str(name).with_context(|| {
            let known: Vec<&str> = HostKind::all().into_iter().map(HostKind::as_str).collect();
            format!("Unknown backend '{name}' (available: {})", known.join(", "))
        }),
        None => Ok(HostKind::infer(binary)),
    }
}

/// Open `binary` with the resolved backend.
pub fn open_binary(
    backend: Option<&str>,
    config: &SearchConfig,
    binary: &Path,
) -> Result<(HostKind, Box<dyn HostAdapter>)> {
    let kind = resolve_backend(backend, config, binary)?;
    let host = open_host(kind, binary, config)
        .with_context(|| format!("Failed to open {} with the {kind} backend", binary.display()))?;
    Ok((kind, host))
}

/// Build the weggli frontend from `--force` and `-R var=regex` arguments.
pub fn build_frontend(force: bool, regexes: &[String]) -> Result<WeggliFrontend> {
    let constraints =
        VariableConstraints::parse(regexes).context("Invalid --regex constraint")?;
    Ok(WeggliFrontend::new().force(force).constraints(constraints))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(log_level(0), log::LevelFilter::Warn);
        assert_eq!(log_level(1), log::LevelFilter::Info);
        assert_eq!(log_level(2), log::LevelFilter::Debug);
        assert_eq!(log_level(7), log::LevelFilter::Trace);
    }

    #[test]
    fn backend_resolution_order() {
        let mut config = SearchConfig::default();
        let snap = Path::new("graph.json");
        assert_eq!(resolve_backend(None, &config, snap).unwrap(), HostKind::Snapshot);
        config.default_backend = Some("snapshot".into());
        assert_eq!(
            resolve_backend(None, &config, Path::new("a.out")).unwrap(),
            HostKind::Snapshot
        );
        let err = resolve_backend(Some("ida"), &config, snap).unwrap_err();
        assert!(format!("{err:#}").contains("Unknown backend 'ida'"));
    }
}

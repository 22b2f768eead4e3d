use std::fs;
use std::path::Path;
use std::str::FromStr;

use pseudogrep_core::config::SearchConfig;
use pseudogrep_core::host::snapshot::{CallTarget, Snapshot, SnapshotFunction};
use pseudogrep_core::host::{open_host, HostKind, SnapshotHost};
use pseudogrep_core::{FunctionRef, HostAdapter, HostError};
use tempfile::tempdir;

const SNAPSHOT_JSON: &str = r#"{
  "binary": "demo.elf",
  "functions": [
    {"address": 4096, "name": "foo"},
    {"address": 8192, "name": "bar"},
    {"address": 12288, "name": "callA", "calls": [4096, "bar"], "pseudocode": "void callA() { foo(); bar(); }"},
    {"address": 16384, "name": "callB", "calls": ["foo"]}
  ]
}"#;

const SNAPSHOT_YAML: &str = "\
binary: demo.elf
functions:
  - address: 4096
    name: foo
  - address: 12288
    name: callA
    calls: [foo]
    pseudocode: |
      void callA() {
        foo();
      }
";

#[test]
fn json_snapshot_resolves_and_decompiles() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("demo.json");
    fs::write(&path, SNAPSHOT_JSON).unwrap();

    let host = SnapshotHost::load(&path).expect("load snapshot");
    assert_eq!(host.source(), Some(path.as_path()));
    assert_eq!(host.functions().len(), 4);

    let foo = host.resolve_function("foo").expect("foo");
    let mut callers: Vec<String> = host.callers_of(&foo).into_iter().map(|f| f.name).collect();
    callers.sort();
    assert_eq!(callers, vec!["callA", "callB"]);

    let call_a = host.resolve_function("callA").unwrap();
    assert!(host.decompile(&call_a).unwrap().contains("bar();"));
    let err = host.decompile(&FunctionRef::new(16384, "callB")).unwrap_err();
    assert!(matches!(err, HostError::Decompilation { address: 16384, .. }));
}

#[test]
fn yaml_snapshot_loads_through_open_host() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("demo.yaml");
    fs::write(&path, SNAPSHOT_YAML).unwrap();

    assert_eq!(HostKind::infer(&path), HostKind::Snapshot);
    let host = open_host(HostKind::Snapshot, &path, &SearchConfig::default()).unwrap();
    assert_eq!(host.name(), "snapshot");
    let foo = host.resolve_function("foo").unwrap();
    assert_eq!(host.callers_of(&foo), vec![FunctionRef::new(12288, "callA")]);
    assert!(host.decompile(&FunctionRef::new(12288, "callA")).unwrap().starts_with("void callA()"));
}

#[test]
fn missing_snapshot_is_missing_binary() {
    let err = SnapshotHost::load(Path::new("does_not_exist.json")).unwrap_err();
    assert!(matches!(err, HostError::MissingBinary(_)));
}

#[test]
fn unknown_call_name_is_a_load_error() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("broken.json");
    fs::write(&path, r#"{"functions":[{"address":1,"name":"a","calls":["nope"]}]}"#).unwrap();
    match SnapshotHost::load(&path).unwrap_err() {
        HostError::Snapshot { path: p, reason } => {
            assert_eq!(p, path);
            assert!(reason.contains("nope"), "{reason}");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn in_memory_snapshot_round_trips_through_serde() {
    let snapshot = Snapshot {
        binary: None,
        functions: vec![
            SnapshotFunction {
                address: 1,
                name: "target".into(),
                calls: vec![],
                pseudocode: None,
            },
            SnapshotFunction {
                address: 2,
                name: "caller".into(),
                calls: vec![CallTarget::Address(1)],
                pseudocode: Some("void caller() { target(); }".into()),
            },
        ],
    };
    let body = serde_json::to_string(&snapshot).unwrap();
    let host = SnapshotHost::from_snapshot(serde_json::from_str(&body).unwrap()).unwrap();
    let target = host.resolve_function("target").unwrap();
    assert_eq!(host.callers_of(&target), vec![FunctionRef::new(2, "caller")]);
}

#[test]
fn backend_names_parse() {
    assert_eq!(HostKind::from_str("snapshot").unwrap(), HostKind::Snapshot);
    assert!(matches!(HostKind::from_str("ida"), Err(HostError::MissingBackend(_))));
    assert!(HostKind::all().contains(&HostKind::Snapshot));
}

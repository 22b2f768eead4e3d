#![cfg(feature = "rizin-backend")]

use std::path::Path;

use pseudogrep_core::config::BackendPaths;
use pseudogrep_core::host::{HostKind, RizinHost};
use pseudogrep_core::{HostAdapter, HostError};

#[test]
fn rizin_host_errors_for_missing_binary() {
    let err =
        RizinHost::open(Path::new("does_not_exist.bin"), &BackendPaths::default()).unwrap_err();
    assert!(matches!(err, HostError::MissingBinary(_)));
}

#[test]
fn rizin_host_reads_fake_listing_and_pseudocode_without_rizin_installed() {
    let temp = tempfile::tempdir().unwrap();
    let bin = temp.path().join("bin");
    std::fs::write(&bin, b"bin").unwrap();
    assert_eq!(HostKind::infer(&bin), HostKind::Rizin);

    // Fake rizin output and version to avoid external dependency in CI.
    let fake_json = temp.path().join("aflj.json");
    std::fs::write(
        &fake_json,
        r#"[{"offset":4096,"name":"sym.callA","callrefs":[{"addr":12288,"type":"C"},{"addr":16384,"type":"CALL"}]},
            {"offset":8192,"name":"sym.callB","callrefs":[{"addr":12288,"type":"C"}]},
            {"offset":12288,"name":"sym.imp.memcpy"},
            {"offset":16384,"name":"sym.imp.strlen"}]"#,
    )
    .unwrap();
    let pseudo = temp.path().join("pseudo");
    std::fs::create_dir_all(&pseudo).unwrap();
    std::fs::write(pseudo.join("1000.c"), "void callA() { memcpy(a, b, strlen(b)); }").unwrap();
    std::fs::write(pseudo.join("2000.c"), "   \n").unwrap();

    std::env::set_var("PSEUDOGREP_RIZIN_FAKE_JSON", &fake_json);
    std::env::set_var("PSEUDOGREP_RIZIN_FAKE_VERSION", "rizin 0.7.0-fake");
    std::env::set_var("PSEUDOGREP_RIZIN_FAKE_PSEUDOCODE_DIR", &pseudo);

    let paths = BackendPaths { rizin: None, rizin_decompile_command: Some("pdc".into()) };
    let host = RizinHost::open(&bin, &paths).expect("open fake rizin");
    assert_eq!(host.version(), "rizin 0.7.0-fake");
    assert_eq!(host.decompile_command(), "pdc");
    assert_eq!(host.functions().len(), 4);

    let memcpy = host.resolve_function("memcpy").expect("memcpy via sym.imp.");
    let strlen = host.resolve_function("strlen").expect("strlen via sym.imp.");
    assert_eq!(host.callers_of(&memcpy).len(), 2);
    assert_eq!(host.callers_of(&strlen).len(), 1);

    let call_a = host.resolve_function("callA").unwrap();
    assert!(host.decompile(&call_a).unwrap().contains("memcpy"));
    let call_b = host.resolve_function("callB").unwrap();
    assert!(matches!(host.decompile(&call_b), Err(HostError::Decompilation { .. })));
    assert!(matches!(host.decompile(&memcpy), Err(HostError::Decompilation { .. })));

    std::env::remove_var("PSEUDOGREP_RIZIN_FAKE_JSON");
    std::env::remove_var("PSEUDOGREP_RIZIN_FAKE_VERSION");
    std::env::remove_var("PSEUDOGREP_RIZIN_FAKE_PSEUDOCODE_DIR");
}

#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn triage_bin() -> PathBuf {
    // Cargo sets this for integration tests.
    PathBuf::from(std::env::var("CARGO_BIN_EXE_triage").expect("CARGO_BIN_EXE_triage must be set"))
}

const ALERTS_FORMAT: &str = r#"{
    "rows": {"kind": "number", "default": 25, "min": 1, "max": 250, "enforced": true},
    "offset": {"kind": "number", "default": 0, "min": 0},
    "query": {"kind": "string", "default": "*"},
    "fq": {"kind": "array", "default": ["status:MALICIOUS"]}
}"#;

fn write_format(dir: &Path) -> PathBuf {
    let path = dir.join("alerts.json");
    std::fs::write(&path, ALERTS_FORMAT).expect("write format");
    path
}

fn triage(dir: &Path, args: &[&str]) -> Output {
    Command::new(triage_bin())
        .args(args)
        .env("TRIAGE_STORAGE_PATH", dir.join("default-store.json"))
        .env_remove("RUST_LOG")
        .output()
        .expect("spawn triage")
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "triage failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).expect("utf-8 stdout")
}

#[test]
fn canon_reads_stdin() {
    use std::io::Write;
    use std::process::Stdio;

    let mut child = Command::new(triage_bin())
        .arg("canon")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn triage");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(br#"{"z":[{"b":1,"a":null}],"a":"x"}"#)
        .expect("write stdin");
    let output = child.wait_with_output().expect("wait");
    assert_eq!(stdout(&output), "{\"a\":\"x\",\"z\":[{\"a\":null,\"b\":1}]}\n");
}

#[test]
fn delta_and_full_render_queries() {
    let dir = tempfile::tempdir().expect("tempdir");
    let format = write_format(dir.path());
    let format = format.to_str().expect("utf-8 path");

    let delta = triage(dir.path(), &["delta", "--format", format, "rows=25&offset=0"]);
    assert_eq!(stdout(&delta), "rows=25\n");

    let delta = triage(
        dir.path(),
        &["delta", "--format", format, "--enforce", "offset", "fq=!(status:MALICIOUS)"],
    );
    assert_eq!(
        stdout(&delta),
        "fq=%21%28status%3AMALICIOUS%29&offset=0&rows=25\n"
    );

    let full = triage(dir.path(), &["full", "--format", format]);
    assert_eq!(
        stdout(&full),
        "fq=status%3AMALICIOUS&offset=0&query=*&rows=25\n"
    );
}

#[test]
fn parse_prints_typed_values() {
    let dir = tempfile::tempdir().expect("tempdir");
    let format = write_format(dir.path());
    let output = triage(
        dir.path(),
        &["parse", "--format", format.to_str().unwrap(), "rows=9000&query=host:x"],
    );
    let typed: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("json");
    assert_eq!(typed["rows"], 250);
    assert_eq!(typed["query"], "host:x");
    assert_eq!(typed["fq"], serde_json::json!(["status:MALICIOUS"]));
}

#[test]
fn save_then_restore_through_store_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let format = write_format(dir.path());
    let format = format.to_str().expect("utf-8 path");
    let store = dir.path().join("views.json");
    let store = store.to_str().expect("utf-8 path");

    let saved = triage(
        dir.path(),
        &["save", "--format", format, "--key", "alerts", "--store", store, "query=host:x"],
    );
    assert_eq!(stdout(&saved), "query=host%3Ax&rows=25\n");

    let restored = triage(
        dir.path(),
        &["restore", "--format", format, "--key", "alerts", "--store", store],
    );
    assert_eq!(stdout(&restored), "query=host%3Ax&rows=25\n");

    let missing = triage(
        dir.path(),
        &["restore", "--format", format, "--key", "other", "--store", store],
    );
    assert_eq!(stdout(&missing), "\n");
}

#[test]
fn errors_exit_nonzero_with_message() {
    let dir = tempfile::tempdir().expect("tempdir");
    let bad = dir.path().join("bad.json");
    std::fs::write(&bad, r#"{"rows": {"kind": "number", "default": "many"}}"#).expect("write");

    let output = triage(dir.path(), &["delta", "--format", bad.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("error: "), "{stderr}");
    assert!(stderr.contains("rows"), "{stderr}");

    let output = triage(dir.path(), &["delta"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn config_reflects_environment() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = triage(dir.path(), &["config"]);
    let config: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("json");
    let expected = dir.path().join("default-store.json");
    assert_eq!(config["storage_path"], expected.to_str().unwrap());
}

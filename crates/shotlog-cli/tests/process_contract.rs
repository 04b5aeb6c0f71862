use std::process::Command;
use std::{env, fs, path::PathBuf};

use tempfile::tempdir;

fn cli_bin_path() -> PathBuf {
    if let Ok(path) = env::var("CARGO_BIN_EXE_shotlog") {
        return PathBuf::from(path);
    }

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let workspace_root = manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .map(PathBuf::from)
        .expect("workspace root");
    let bin_name = if cfg!(windows) { "shotlog.exe" } else { "shotlog" };
    let fallback = workspace_root.join("target").join("debug").join(bin_name);
    assert!(
        fallback.exists(),
        "shotlog binary not found at {}",
        fallback.display()
    );
    fallback
}

fn seed_collection(path: &std::path::Path) {
    let records = serde_json::json!([
        {
            "id": "a.png",
            "captured_at": "2024-05-01T12:00:00Z",
            "ocr_text": "cargo build --release",
            "tags": [],
            "summary": "",
            "confidence": 0.0,
            "status": "unprocessed",
            "processed": 0
        }
    ]);
    fs::write(path, serde_json::to_string_pretty(&records).expect("json"))
        .expect("seed collection");
}

#[test]
fn status_process_contract_returns_non_zero_for_missing_collection() {
    // Pseudocode:
    // Given a directory without a collection file
    // When running `shotlog --file missing.json status`
    // Then process exits non-zero and names the missing path.
    let root = tempdir().expect("tempdir");
    let missing = root.path().join("missing.json");
    let output = Command::new(cli_bin_path())
        .args(["--file", missing.to_str().expect("path"), "status"])
        .output()
        .expect("run status");

    assert!(
        !output.status.success(),
        "stdout: {}",
        String::from_utf8_lossy(&output.stdout)
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("missing.json"));
}

#[test]
fn status_process_contract_emits_progress_json() {
    // Pseudocode:
    // Given a collection with one unprocessed record
    // When running `shotlog status`
    // Then process exits with success and emits the progress counters.
    let root = tempdir().expect("tempdir");
    let file = root.path().join("screenshots.json");
    seed_collection(&file);

    let output = Command::new(cli_bin_path())
        .args(["--file", file.to_str().expect("path"), "status"])
        .output()
        .expect("run status");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"total\": 1"));
    assert!(stdout.contains("\"processed\": 0"));
    assert!(stdout.contains("\"deferred\": 0"));
}

#[cfg(unix)]
#[test]
fn run_process_contract_enriches_with_a_stub_model_program() {
    use std::os::unix::fs::PermissionsExt;

    // Pseudocode:
    // Given a collection with one pending record and a stub model program
    // When running `shotlog run --no-interactive --no-confirm`
    // Then process exits with success and the record lands processed.
    let root = tempdir().expect("tempdir");
    let file = root.path().join("screenshots.json");
    seed_collection(&file);

    let stub = root.path().join("stub-model.sh");
    fs::write(
        &stub,
        concat!(
            "#!/bin/sh\n",
            "cat >/dev/null\n",
            "echo '[{\"filename\":\"a.png\",\"tags_ai\":[\"development\"],",
            "\"summary\":\"A release build.\",\"confidence\":0.9,\"ask_user\":false}]'\n"
        ),
    )
    .expect("write stub");
    fs::set_permissions(&stub, fs::Permissions::from_mode(0o755)).expect("chmod stub");

    let output = Command::new(cli_bin_path())
        .args([
            "--file",
            file.to_str().expect("path"),
            "run",
            "--model-program",
            stub.to_str().expect("stub path"),
            "--model",
            "stub",
            "--no-interactive",
            "--no-confirm",
            "--no-logs",
            "--sleep",
            "0",
        ])
        .output()
        .expect("run enrichment");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("run complete"));

    let raw = fs::read_to_string(&file).expect("read collection");
    let records: serde_json::Value = serde_json::from_str(&raw).expect("parse collection");
    let record = &records.as_array().expect("array")[0];
    assert_eq!(record["status"], "processed");
    assert_eq!(record["processed"], 1);
    assert_eq!(record["tags"][0], "development");
    assert_eq!(record["summary"], "A release build.");
}

#[cfg(unix)]
#[test]
fn run_process_contract_interrupt_flushes_and_exits_cleanly() {
    use std::os::unix::fs::PermissionsExt;
    use std::process::Stdio;
    use std::thread;
    use std::time::Duration;

    // Pseudocode:
    // Given two time groups and a slow stub model
    // When SIGINT arrives during the first batch
    // Then the process saves the collection, reports the interruption,
    // and exits with success instead of dying mid-batch.
    let root = tempdir().expect("tempdir");
    let file = root.path().join("screenshots.json");
    let records = serde_json::json!([
        {"id": "a.png", "captured_at": "2024-05-01T12:00:00Z", "ocr_text": "one"},
        {"id": "b.png", "captured_at": "2024-05-01T13:00:00Z", "ocr_text": "two"}
    ]);
    fs::write(&file, serde_json::to_string_pretty(&records).expect("json"))
        .expect("seed collection");

    let stub = root.path().join("slow-model.sh");
    fs::write(
        &stub,
        concat!(
            "#!/bin/sh\n",
            "cat >/dev/null\n",
            "sleep 2\n",
            "echo '[{\"filename\":\"a.png\",\"tags_ai\":[\"ok\"],",
            "\"summary\":\"s\",\"confidence\":0.9}]'\n"
        ),
    )
    .expect("write stub");
    fs::set_permissions(&stub, fs::Permissions::from_mode(0o755)).expect("chmod stub");

    let child = Command::new(cli_bin_path())
        .args([
            "--file",
            file.to_str().expect("path"),
            "run",
            "--model-program",
            stub.to_str().expect("stub path"),
            "--model",
            "stub",
            "--no-interactive",
            "--auto",
            "--no-logs",
            "--sleep",
            "0",
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn run");

    thread::sleep(Duration::from_millis(500));
    let signalled = Command::new("kill")
        .args(["-s", "INT", &child.id().to_string()])
        .status()
        .expect("send SIGINT");
    assert!(signalled.success());

    let output = child.wait_with_output().expect("wait for run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("run interrupted, collection saved"));

    let raw = fs::read_to_string(&file).expect("read collection");
    let saved: serde_json::Value = serde_json::from_str(&raw).expect("parse collection");
    let second = &saved.as_array().expect("array")[1];
    assert_eq!(second["id"], "b.png");
    assert_eq!(second["processed"], 0);
}

#[cfg(unix)]
#[test]
fn run_process_contract_defers_low_confidence_in_unattended_mode() {
    use std::os::unix::fs::PermissionsExt;

    let root = tempdir().expect("tempdir");
    let file = root.path().join("screenshots.json");
    seed_collection(&file);

    let stub = root.path().join("stub-model.sh");
    fs::write(
        &stub,
        concat!(
            "#!/bin/sh\n",
            "cat >/dev/null\n",
            "echo '[{\"filename\":\"a.png\",\"tags_ai\":[],",
            "\"summary\":\"\",\"confidence\":0.2}]'\n"
        ),
    )
    .expect("write stub");
    fs::set_permissions(&stub, fs::Permissions::from_mode(0o755)).expect("chmod stub");

    let output = Command::new(cli_bin_path())
        .args([
            "--file",
            file.to_str().expect("path"),
            "run",
            "--model-program",
            stub.to_str().expect("stub path"),
            "--model",
            "stub",
            "--no-interactive",
            "--auto",
            "--no-logs",
            "--sleep",
            "0",
        ])
        .output()
        .expect("run enrichment");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let raw = fs::read_to_string(&file).expect("read collection");
    let records: serde_json::Value = serde_json::from_str(&raw).expect("parse collection");
    let record = &records.as_array().expect("array")[0];
    assert_eq!(record["status"], "deferred");
    assert_eq!(record["processed"], 0);
    assert!(record["defer_until"].is_string());
}

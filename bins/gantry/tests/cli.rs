//! End-to-end integration tests for the `gantry` import CLI.
//!
//! Each test:
//! 1. Writes CSV fixtures into a temp directory
//! 2. Runs the binary with import flags
//! 3. Verifies the report on stdout and the exit status

use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

/// Helper to run the gantry CLI command
fn run_gantry(args: &[&str]) -> (bool, String, String) {
    let output = Command::new("cargo")
        .args(["run", "--quiet", "--bin", "gantry", "--"])
        .args(args)
        .output()
        .expect("Failed to execute gantry command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    (output.status.success(), stdout, stderr)
}

fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn person_fixture(dir: &TempDir) -> (String, String) {
    let people = write_file(
        dir,
        "people.csv",
        "id:int:ID,name:string\n1,Alice\n2,Bob\n",
    );
    let knows = write_file(
        dir,
        "knows.csv",
        "from:int:START_ID,to:int:END_ID,kind:TYPE\n1,2,KNOWS\n",
    );
    (
        format!("Person={}", people.display()),
        knows.display().to_string(),
    )
}

// ============================================================================
// Report Output Tests
// ============================================================================

#[test]
fn test_import_prints_text_report() {
    let dir = TempDir::new().unwrap();
    let (nodes, relationships) = person_fixture(&dir);

    let (success, stdout, stderr) = run_gantry(&[
        "--nodes",
        &nodes,
        "--relationships",
        &relationships,
        "--edge-labels",
        "KNOWS",
    ]);

    assert!(success, "Import failed: {}", stderr);
    assert!(
        stdout.contains("Person: created 2"),
        "Expected Person outcome in report: {}",
        stdout
    );
    assert!(
        stdout.contains("total: 2 vertices, 1 edges"),
        "Expected totals in report: {}",
        stdout
    );
}

#[test]
fn test_import_prints_json_report() {
    let dir = TempDir::new().unwrap();
    let (nodes, relationships) = person_fixture(&dir);

    let (success, stdout, stderr) = run_gantry(&[
        "--nodes",
        &nodes,
        "--relationships",
        &relationships,
        "--format",
        "json",
    ]);

    assert!(success, "Import failed: {}", stderr);
    let report: serde_json::Value =
        serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("Bad JSON ({}): {}", e, stdout));
    assert_eq!(report["total_vertices"], 2);
    assert_eq!(report["total_edges"], 1);
    assert_eq!(report["registered_ids"], 2);
    assert_eq!(report["vertices"][0]["name"], "Person");
    assert_eq!(report["vertices"][0]["error"], serde_json::Value::Null);
}

#[test]
fn test_limit_rows_flag_caps_ingestion() {
    let dir = TempDir::new().unwrap();
    let (nodes, relationships) = person_fixture(&dir);

    let (success, stdout, stderr) = run_gantry(&[
        "--nodes",
        &nodes,
        "--relationships",
        &relationships,
        "-n",
        "1",
    ]);

    assert!(success, "Import failed: {}", stderr);
    assert!(
        stdout.contains("Person: created 1"),
        "Expected limited outcome: {}",
        stdout
    );
}

// ============================================================================
// Error Handling Tests
// ============================================================================

#[test]
fn test_missing_input_file_fails() {
    let (success, _stdout, stderr) = run_gantry(&[
        "--nodes",
        "Person=/nonexistent/people.csv",
    ]);

    assert!(!success, "Should fail with a missing input file");
    assert!(
        stderr.contains("Import failed"),
        "Expected error on stderr: {}",
        stderr
    );
}

#[test]
fn test_failed_loader_sets_exit_code() {
    let dir = TempDir::new().unwrap();
    // The duplicated business id fails the Person loader.
    let people = write_file(&dir, "people.csv", "id:int:ID\n7\n7\n");
    let nodes = format!("Person={}", people.display());

    let (success, stdout, _stderr) = run_gantry(&["--nodes", &nodes]);

    assert!(!success, "Should exit nonzero when a loader fails");
    assert!(
        stdout.contains("FAILED"),
        "Expected failed outcome in report: {}",
        stdout
    );
}

#[test]
fn test_nodes_flag_is_required() {
    let (success, _stdout, stderr) = run_gantry(&[]);

    assert!(!success, "Should fail without --nodes");
    assert!(
        stderr.contains("--nodes"),
        "Expected usage error naming --nodes: {}",
        stderr
    );
}

//! Driver tests: run the `mdmath` binary against files in a temporary
//! directory and check its output files, messages, and exit status.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Path to the `mdmath` binary built by this Cargo workspace.
fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_mdmath"))
}

fn run(args: &[&str], dir: &Path) -> Output {
    Command::new(binary())
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run mdmath")
}

fn stdout(o: &Output) -> String {
    String::from_utf8_lossy(&o.stdout).into_owned()
}

fn stderr(o: &Output) -> String {
    String::from_utf8_lossy(&o.stderr).into_owned()
}

const DOC: &str = "# Sums\n\n$1+2+3 py(sum = THIS)$ is $py(ReplaceThis(sum()))$.\n";
const EXPECTED: &str = "# Sums\n\n$1+2+3$ is $6$.\n";

// ── Tests ─────────────────────────────────────────────────────────────────────

#[test]
fn writes_default_output_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("doc.md"), DOC).unwrap();

    let out = run(&["doc.md"], dir.path());
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(fs::read_to_string(dir.path().join("doc.output.md")).unwrap(), EXPECTED);
    assert_eq!(stdout(&out).trim(), "Output written to doc.output.md");
}

#[test]
fn explicit_output_path() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("doc.md"), DOC).unwrap();

    let out = run(&["doc.md", "-o", "result.md"], dir.path());
    assert!(out.status.success());
    assert_eq!(fs::read_to_string(dir.path().join("result.md")).unwrap(), EXPECTED);
    assert!(!dir.path().join("doc.output.md").exists());
    assert_eq!(stdout(&out).trim(), "Output written to result.md");
}

#[test]
fn stdout_mode_writes_no_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("doc.md"), DOC).unwrap();

    let out = run(&["--stdout", "doc.md"], dir.path());
    assert!(out.status.success());
    assert_eq!(stdout(&out), EXPECTED);
    assert!(!dir.path().join("doc.output.md").exists());
}

#[test]
fn missing_file_exits_with_error() {
    let dir = tempfile::tempdir().unwrap();

    let out = run(&["absent.md"], dir.path());
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("Error: File not found: absent.md"), "{}", stderr(&out));
}

#[test]
fn non_markdown_extension_warns_and_continues() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("notes.txt"), "$2 py(ReplaceAll(str(THIS())))$").unwrap();

    let out = run(&["notes.txt"], dir.path());
    assert!(out.status.success());
    assert!(stderr(&out).contains("Warning: File does not have .md extension: notes.txt"));
    assert_eq!(fs::read_to_string(dir.path().join("notes.output.md")).unwrap(), "$2$");
}

#[test]
fn precision_flag() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("third.md"), r"$\frac{1}{3} py(ReplaceAll(str(THIS())))$").unwrap();

    let out = run(&["--precision", "3", "--stdout", "third.md"], dir.path());
    assert!(out.status.success());
    assert_eq!(stdout(&out), "$0.333$");
}

#[test]
fn version_flag() {
    let dir = tempfile::tempdir().unwrap();
    let out = run(&["-V"], dir.path());
    assert!(out.status.success());
    assert!(stdout(&out).contains(env!("CARGO_PKG_VERSION")));
}

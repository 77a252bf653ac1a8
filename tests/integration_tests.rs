//! Integration tests for the presspool CLI

use assert_cmd::Command;
use flate2::read::GzDecoder;
use predicates::prelude::*;
use std::fs;
use std::io::Read;
use std::path::Path;
use tempfile::TempDir;

/// A command isolated from the user's and the repository's config files
fn presspool(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("presspool").unwrap();
    cmd.current_dir(dir).env("HOME", dir).env_remove("RUST_LOG");
    cmd
}

fn write_pdf(dir: &Path, name: &str, pages: usize) -> Vec<u8> {
    let mut body = b"%PDF-1.7\n".to_vec();
    for page in 0..pages {
        body.extend_from_slice(format!("{} 0 obj << /Type /Page >> endobj\n", page).as_bytes());
    }
    fs::write(dir.join(name), &body).unwrap();
    body
}

fn gunzip(path: &Path) -> Vec<u8> {
    let mut decoded = Vec::new();
    GzDecoder::new(fs::File::open(path).unwrap())
        .read_to_end(&mut decoded)
        .unwrap();
    decoded
}

#[test]
fn test_cli_help() {
    let temp_dir = TempDir::new().unwrap();
    presspool(temp_dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("worker units"));
}

#[test]
fn test_cli_version() {
    let temp_dir = TempDir::new().unwrap();
    presspool(temp_dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("presspool"));

    presspool(temp_dir.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_invalid_subcommand() {
    let temp_dir = TempDir::new().unwrap();
    presspool(temp_dir.path())
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_compress_batch() {
    let temp_dir = TempDir::new().unwrap();
    let first = write_pdf(temp_dir.path(), "a.pdf", 200);
    let second = write_pdf(temp_dir.path(), "b.pdf", 50);
    fs::write(temp_dir.path().join("notes.txt"), "not a document").unwrap();

    presspool(temp_dir.path())
        .args(["compress", "--workers", "2", "a.pdf", "b.pdf", "notes.txt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Completed! 2/2 files processed successfully."))
        .stderr(predicate::str::contains("notes.txt"));

    assert_eq!(gunzip(&temp_dir.path().join("compressed_a.pdf.gz")), first);
    assert_eq!(gunzip(&temp_dir.path().join("compressed_b.pdf.gz")), second);
    assert!(!temp_dir.path().join("compressed_notes.txt.gz").exists());
}

#[test]
fn test_compress_into_output_dir_with_json_report() {
    let temp_dir = TempDir::new().unwrap();
    write_pdf(temp_dir.path(), "deck.pdf", 100);

    let assert = presspool(temp_dir.path())
        .args(["compress", "deck.pdf", "--output-dir", "out", "--level", "9", "--format", "json"])
        .assert()
        .success();

    let report: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(report["processed"], 1);
    assert_eq!(report["total"], 1);
    assert_eq!(report["files"][0]["success"], true);
    assert!(report["files"][0]["compressedSize"].as_u64().unwrap() > 0);
    assert!(temp_dir.path().join("out/compressed_deck.pdf.gz").exists());
}

#[test]
fn test_compress_reports_colliding_outputs() {
    let temp_dir = TempDir::new().unwrap();
    for sub in ["a", "b"] {
        fs::create_dir(temp_dir.path().join(sub)).unwrap();
    }
    let kept = write_pdf(&temp_dir.path().join("a"), "x.pdf", 30);
    write_pdf(&temp_dir.path().join("b"), "x.pdf", 60);

    let assert = presspool(temp_dir.path())
        .args(["compress", "a/x.pdf", "b/x.pdf", "-o", "out", "--format", "json"])
        .assert()
        .success();

    let report: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(report["processed"], 1);
    assert_eq!(report["total"], 2);
    let collided = report["files"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["input"] == "b/x.pdf")
        .unwrap();
    assert_eq!(collided["success"], false);

    let written: Vec<_> = fs::read_dir(temp_dir.path().join("out")).unwrap().collect();
    assert_eq!(written.len(), 1);
    assert_eq!(gunzip(&temp_dir.path().join("out/compressed_x.pdf.gz")), kept);
}

#[test]
fn test_output_dir_flag_satisfies_prefix_rule() {
    let temp_dir = TempDir::new().unwrap();
    write_pdf(temp_dir.path(), "deck.pdf", 10);
    fs::write(temp_dir.path().join("presspool.toml"), "[output]\nprefix = \"\"\n").unwrap();

    presspool(temp_dir.path())
        .args(["compress", "deck.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("output.prefix"));

    presspool(temp_dir.path())
        .args(["compress", "deck.pdf", "--output-dir", "out"])
        .assert()
        .success();
    assert!(temp_dir.path().join("out/deck.pdf.gz").exists());
}

#[test]
fn test_compress_rejects_non_pdf_inputs() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("image.png"), b"\x89PNG\r\n").unwrap();

    presspool(temp_dir.path())
        .args(["compress", "image.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No acceptable input files"));
}

#[test]
fn test_compress_accepts_any_input_when_pdf_only_is_off() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("data.csv"), "a,b\n1,2\n").unwrap();
    fs::write(temp_dir.path().join("presspool.toml"), "[input]\npdf_only = false\n").unwrap();

    presspool(temp_dir.path())
        .args(["compress", "data.csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1/1"));

    assert!(temp_dir.path().join("compressed_data.csv.gz").exists());
}

#[test]
fn test_config_show_and_validate() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("custom.yaml");
    fs::write(&config_path, "pool:\n  size: 3\noutput:\n  prefix: small_\n").unwrap();

    presspool(temp_dir.path())
        .args(["config", "show", "--format", "json", "--config"])
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("small_"));

    presspool(temp_dir.path())
        .args(["config", "validate", "--config"])
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"));
}

#[test]
fn test_config_validate_rejects_bad_level() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("bad.toml");
    fs::write(&config_path, "[engine]\nlevel = 42\n").unwrap();

    presspool(temp_dir.path())
        .args(["config", "validate", "--config"])
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("engine.level"));
}

#[test]
fn test_environment_overrides_config() {
    let temp_dir = TempDir::new().unwrap();

    presspool(temp_dir.path())
        .env("PRESSPOOL_OUTPUT__PREFIX", "env_")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("prefix = \"env_\""));
}

//! End-to-end tests for the verify, run and probe commands.

#![allow(clippy::unwrap_used)]
#![allow(deprecated)] // cargo_bin deprecation

use std::path::Path;

use assert_cmd::Command;
use eyestate_test_support::{SyntheticEyes, ZeroModel};
use image::{Rgba, RgbaImage};
use predicates::prelude::*;
use tempfile::TempDir;

struct Env {
    xdg: TempDir,
    models: TempDir,
}

impl Env {
    fn new() -> Self {
        let models = tempfile::tempdir().unwrap();
        ZeroModel::write(models.path()).unwrap();
        Self {
            xdg: tempfile::tempdir().unwrap(),
            models,
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("eyestate").unwrap();
        cmd.current_dir(self.xdg.path())
            .env("XDG_CONFIG_HOME", self.xdg.path())
            .env("XDG_DATA_HOME", self.xdg.path());
        cmd
    }

    fn models_dir(&self) -> &Path {
        self.models.path()
    }
}

fn parse_lines(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
fn test_verify_prints_five_jsonl_entries() {
    let env = Env::new();
    let eyes = tempfile::tempdir().unwrap();
    SyntheticEyes::write_bundle_dir(eyes.path(), 5).unwrap();

    let output = env
        .cmd()
        .arg("verify")
        .arg(eyes.path())
        .arg("--models-dir")
        .arg(env.models_dir())
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));

    let lines = parse_lines(&output.stdout);
    assert_eq!(lines.len(), 5);
    for (i, line) in lines.iter().enumerate() {
        assert_eq!(line["index"], i);
        let scores = line["scores"].as_array().unwrap();
        assert_eq!(scores.len(), 7);
        let s = scores[0].as_f64().unwrap();
        assert!((s - 2.0 / 7.0).abs() < 1e-5);
        assert_eq!(line["label"], "state_0");
    }
}

#[test]
fn test_verify_json_report() {
    let env = Env::new();
    let eyes = tempfile::tempdir().unwrap();
    SyntheticEyes::write_bundle_dir(eyes.path(), 5).unwrap();

    let output = env
        .cmd()
        .arg("verify")
        .arg(eyes.path())
        .arg("--model")
        .arg(env.models_dir().join("eye_state.safetensors"))
        .arg("--labels")
        .arg(env.models_dir().join("labels.txt"))
        .args(["--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["entries"].as_array().unwrap().len(), 5);
    assert!(report["verification_time"].is_u64());
    assert!(report["timestamp"].as_str().unwrap().contains('T'));
}

#[test]
fn test_verify_incomplete_bundle_fails() {
    let env = Env::new();
    let eyes = tempfile::tempdir().unwrap();
    SyntheticEyes::write_bundle_dir(eyes.path(), 3).unwrap();

    env.cmd()
        .arg("verify")
        .arg(eyes.path())
        .arg("--models-dir")
        .arg(env.models_dir())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("left_3"));
}

#[test]
fn test_verify_without_model_suggests_fetch() {
    let env = Env::new();
    let eyes = tempfile::tempdir().unwrap();
    SyntheticEyes::write_bundle_dir(eyes.path(), 5).unwrap();
    let empty = tempfile::tempdir().unwrap();

    env.cmd()
        .arg("verify")
        .arg(eyes.path())
        .arg("--models-dir")
        .arg(empty.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("eyestate models fetch"));
}

#[test]
fn test_verify_class_count_mismatch() {
    let env = Env::new();
    let eyes = tempfile::tempdir().unwrap();
    SyntheticEyes::write_bundle_dir(eyes.path(), 5).unwrap();
    std::fs::write(
        env.xdg.path().join(".eyestate.toml"),
        "[inference]\nnum_classes = 3\n",
    )
    .unwrap();

    env.cmd()
        .arg("verify")
        .arg(eyes.path())
        .arg("--models-dir")
        .arg(env.models_dir())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn test_run_scores_synthetic_stream() {
    let env = Env::new();
    let source = env.xdg.path().join("face.png");
    RgbaImage::from_fn(320, 240, |x, y| {
        if (x / 5 + y / 5) % 2 == 0 {
            Rgba([25, 25, 25, 255])
        } else {
            Rgba([225, 210, 200, 255])
        }
    })
    .save(&source)
    .unwrap();

    let output = env
        .cmd()
        .arg("run")
        .arg("--source")
        .arg(&source)
        .args(["--interval-ms", "5", "--timeout", "60"])
        .arg("--models-dir")
        .arg(env.models_dir())
        .output()
        .unwrap();
    assert_eq!(
        output.status.code(),
        Some(0),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(parse_lines(&output.stdout).len(), 5);
}

#[test]
fn test_run_flat_image_is_not_verified() {
    let env = Env::new();
    let source = env.xdg.path().join("flat.png");
    RgbaImage::from_pixel(64, 64, Rgba([128, 128, 128, 255]))
        .save(&source)
        .unwrap();

    env.cmd()
        .arg("run")
        .arg("--source")
        .arg(&source)
        .args(["--interval-ms", "5", "--timeout", "1"])
        .arg("--models-dir")
        .arg(env.models_dir())
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_run_missing_source() {
    let env = Env::new();
    env.cmd()
        .args(["run", "--source", "/nonexistent/face.png"])
        .arg("--models-dir")
        .arg(env.models_dir())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to open source image"));
}

#[test]
fn test_probe_picks_size_and_transform() {
    let env = Env::new();
    let output = env
        .cmd()
        .args([
            "probe",
            "--sizes",
            "1920x1080,1280x720,640x480",
            "--view",
            "1080x1920",
            "--rotation",
            "90",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["device_id"], "1");
    assert!(report["resolution"]["size"]["width"].is_u64());
    assert!(report["transform"]["fill_scale"].as_f64().unwrap() >= 1.0);
    let rotation = report["transform"]["rotation_degrees"].as_f64().unwrap();
    let r = (rotation + 90.0).rem_euclid(360.0);
    assert!(r < 1e-3 || r > 360.0 - 1e-3);
    assert_eq!(report["still_orientation"], 0);
}

#[test]
fn test_models_list_shows_installed() {
    let env = Env::new();
    env.cmd()
        .arg("models")
        .arg("--models-dir")
        .arg(env.models_dir())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("2/2 models installed"));
}

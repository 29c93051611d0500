//! Integration tests for configuration layering.
//!
//! Tests the full priority chain: hardcoded defaults < XDG config < project config < CLI args

#![allow(clippy::unwrap_used)] // Test code uses unwrap for brevity
#![allow(deprecated)] // cargo_bin deprecation warning

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn eyestate(cwd: &Path, xdg: &Path) -> Command {
    let mut cmd = Command::cargo_bin("eyestate").unwrap();
    cmd.current_dir(cwd)
        .env("XDG_CONFIG_HOME", xdg)
        .env("XDG_DATA_HOME", xdg);
    cmd
}

#[test]
fn test_default_models_dir_under_data_home() {
    let project = tempfile::tempdir().unwrap();
    let xdg = tempfile::tempdir().unwrap();

    eyestate(project.path(), xdg.path())
        .args(["models", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("eyestate/models"));
}

#[test]
fn test_xdg_config_sets_models_dir() {
    let project = tempfile::tempdir().unwrap();
    let xdg = tempfile::tempdir().unwrap();
    fs::create_dir_all(xdg.path().join("eyestate")).unwrap();
    fs::write(
        xdg.path().join("eyestate/config.toml"),
        "[models]\ndir = '/from/xdg'\n",
    )
    .unwrap();

    eyestate(project.path(), xdg.path())
        .args(["models", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/from/xdg"));
}

#[test]
fn test_project_config_overrides_xdg() {
    let project = tempfile::tempdir().unwrap();
    let nested = project.path().join("sub");
    fs::create_dir_all(&nested).unwrap();
    let xdg = tempfile::tempdir().unwrap();
    fs::create_dir_all(xdg.path().join("eyestate")).unwrap();
    fs::write(
        xdg.path().join("eyestate/config.toml"),
        "[models]\ndir = '/from/xdg'\n",
    )
    .unwrap();
    fs::write(
        project.path().join(".eyestate.toml"),
        "[models]\ndir = '/from/project'\n",
    )
    .unwrap();

    // Found by searching upward from a subdirectory.
    eyestate(&nested, xdg.path())
        .args(["models", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/from/project"));
}

#[test]
fn test_cli_overrides_project_config() {
    let project = tempfile::tempdir().unwrap();
    let xdg = tempfile::tempdir().unwrap();
    fs::write(
        project.path().join(".eyestate.toml"),
        "[models]\ndir = '/from/project'\n",
    )
    .unwrap();

    eyestate(project.path(), xdg.path())
        .args(["models", "--models-dir", "/from/cli", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/from/cli"));
}

#[test]
fn test_invalid_config_value_warns() {
    let project = tempfile::tempdir().unwrap();
    let xdg = tempfile::tempdir().unwrap();
    fs::write(
        project.path().join(".eyestate.toml"),
        "[camera]\nfacing = 'sideways'\n",
    )
    .unwrap();

    eyestate(project.path(), xdg.path())
        .args(["models", "path"])
        .assert()
        .success()
        .stderr(predicate::str::contains("warning: camera.facing"));
}

#[test]
fn test_config_facing_used_by_probe() {
    let project = tempfile::tempdir().unwrap();
    let xdg = tempfile::tempdir().unwrap();
    fs::write(
        project.path().join(".eyestate.toml"),
        "[camera]\nfacing = 'back'\n",
    )
    .unwrap();

    eyestate(project.path(), xdg.path())
        .arg("probe")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""device_id":"0""#));

    eyestate(project.path(), xdg.path())
        .args(["probe", "--facing", "front"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""device_id":"1""#));
}

#[test]
fn test_fetch_without_base_url_fails() {
    let project = tempfile::tempdir().unwrap();
    let xdg = tempfile::tempdir().unwrap();

    eyestate(project.path(), xdg.path())
        .args(["models", "fetch"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No model source configured"));
}

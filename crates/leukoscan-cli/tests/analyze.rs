//! End-to-end tests of `leukoscan analyze` against canned HTTP services.

#![allow(clippy::unwrap_used)]
#![allow(deprecated)] // cargo_bin deprecation

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use leukoscan_test_support::{CannedHttpServer, SyntheticImageBuilder};
use predicates::prelude::*;
use tempfile::TempDir;

/// Two eyes 40 px apart. Every detector gets the same reply, so the face gate
/// sees two faces and each eye crop sees these boxes as iris candidates.
const TWO_EYES: &str = r#"{"predictions":[
    {"x":20,"y":20,"width":16,"height":8,"confidence":0.9,"class":"eye"},
    {"x":60,"y":20,"width":16,"height":8,"confidence":0.9,"class":"eye"}
]}"#;

fn leukoscan(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("leukoscan").unwrap();
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env("NO_PROXY", "127.0.0.1,localhost")
        .env_remove("LEUKOSCAN_API_KEY")
        .current_dir(home);
    cmd
}

fn write_photo(dir: &Path) -> PathBuf {
    let path = dir.join("face.png");
    let image = SyntheticImageBuilder::uniform_gray(400, 300, 128);
    std::fs::write(&path, SyntheticImageBuilder::png_bytes(&image)).unwrap();
    path
}

fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    format!("http://{}", listener.local_addr().unwrap())
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_flagged_eyes_exit_one() {
    let home = TempDir::new().unwrap();
    let photo = write_photo(home.path());
    let detectors = CannedHttpServer::start(200, TWO_EYES).unwrap();
    let classifier = CannedHttpServer::start(200, r#"{"prediction": 0.9}"#).unwrap();

    let output = leukoscan(home.path())
        .arg("analyze")
        .arg(&photo)
        .args(["--api-url", &detectors.url(), "--api-key", "test"])
        .args(["--classifier", "remote", "--classifier-url", &classifier.url()])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let json = stdout_json(&output);
    assert_eq!(json["leukocoria"]["left"], true);
    assert_eq!(json["leukocoria"]["right"], true);
    assert_eq!(json["warnings"], serde_json::json!([]));
    assert_eq!(
        json["two_eyes"]["left"]["bounds"],
        serde_json::json!([4, 0, 36, 40])
    );
    assert_eq!(
        json["two_eyes"]["left"]["iris"],
        serde_json::json!([12, 16, 28, 24])
    );

    let paths: Vec<String> = detectors.requests().into_iter().map(|r| r.path).collect();
    assert_eq!(paths.len(), 4);
    assert!(paths.contains(&"/face-detector-v4liw/2?api_key=test".to_string()));
    assert!(paths.contains(&"/eye-detection-kso3d/3?api_key=test".to_string()));
    assert_eq!(
        paths
            .iter()
            .filter(|p| p.starts_with("/iris_120_set/7"))
            .count(),
        2
    );
    assert_eq!(classifier.requests().len(), 2);
}

#[test]
fn test_unflagged_eyes_exit_zero() {
    let home = TempDir::new().unwrap();
    let photo = write_photo(home.path());
    let detectors = CannedHttpServer::start(200, TWO_EYES).unwrap();
    let classifier = CannedHttpServer::start(200, r#"{"prediction": 0.5}"#).unwrap();

    let output = leukoscan(home.path())
        .arg("analyze")
        .arg(&photo)
        .args(["--api-url", &detectors.url(), "--api-key", "test"])
        .args(["--classifier", "remote", "--classifier-url", &classifier.url()])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    let json = stdout_json(&output);
    assert_eq!(json["leukocoria"]["left"], false);
    assert_eq!(json["leukocoria"]["right"], false);
}

#[test]
fn test_no_face_is_success_with_warning() {
    let home = TempDir::new().unwrap();
    let photo = write_photo(home.path());
    let detectors = CannedHttpServer::start(200, r#"{"predictions": []}"#).unwrap();

    leukoscan(home.path())
        .arg("analyze")
        .arg(&photo)
        .args(["--api-url", &detectors.url(), "--api-key", "test"])
        .assert()
        .code(0)
        .stdout(
            predicate::str::contains("No face detected.")
                .and(predicate::str::contains("\"leukocoria\":null")),
        );
    assert_eq!(detectors.requests().len(), 1);
}

#[test]
fn test_unreachable_detector_exit_three() {
    let home = TempDir::new().unwrap();
    let photo = write_photo(home.path());

    leukoscan(home.path())
        .arg("analyze")
        .arg(&photo)
        .args(["--api-url", &closed_port_url(), "--retries", "0"])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("upstream_unavailable"));
}

#[test]
fn test_detector_error_status_exit_three() {
    let home = TempDir::new().unwrap();
    let photo = write_photo(home.path());
    let detectors = CannedHttpServer::start(500, r#"{"message":"boom"}"#).unwrap();

    leukoscan(home.path())
        .arg("analyze")
        .arg(&photo)
        .args(["--api-url", &detectors.url(), "--retries", "1"])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("face detector unavailable after 2 attempt(s)"));
    assert_eq!(detectors.requests().len(), 2);
}

#[test]
fn test_unreachable_classifier_exit_four() {
    let home = TempDir::new().unwrap();
    let photo = write_photo(home.path());
    let detectors = CannedHttpServer::start(200, TWO_EYES).unwrap();

    leukoscan(home.path())
        .arg("analyze")
        .arg(&photo)
        .args(["--api-url", &detectors.url(), "--retries", "0"])
        .args(["--classifier", "remote", "--classifier-url", &closed_port_url()])
        .assert()
        .code(4)
        .stdout(predicate::str::contains("classification_unavailable"));
}

#[test]
fn test_missing_local_model_exit_four() {
    let home = TempDir::new().unwrap();
    let photo = write_photo(home.path());
    let detectors = CannedHttpServer::start(200, TWO_EYES).unwrap();

    leukoscan(home.path())
        .arg("analyze")
        .arg(&photo)
        .args(["--api-url", &detectors.url(), "--retries", "0"])
        .arg("--models-dir")
        .arg(home.path().join("no-models"))
        .assert()
        .code(4)
        .stdout(predicate::str::contains("classification_unavailable"));
}

#[test]
fn test_store_writes_record() {
    let home = TempDir::new().unwrap();
    let photo = write_photo(home.path());
    let store = home.path().join("results");
    let detectors = CannedHttpServer::start(200, TWO_EYES).unwrap();
    let classifier = CannedHttpServer::start(200, r#"{"prediction": 0.1}"#).unwrap();

    let output = leukoscan(home.path())
        .arg("analyze")
        .arg(&photo)
        .args(["--api-url", &detectors.url()])
        .args(["--classifier", "remote", "--classifier-url", &classifier.url()])
        .arg("--store")
        .arg(&store)
        .arg("--pretty")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    let json = stdout_json(&output);
    let id = json["id"].as_u64().unwrap();
    assert_eq!(json["original"], format!("{id}_face.png"));
    assert_eq!(
        json["two_eyes"]["right"]["image"],
        format!("two_eyes/{id}_right_face.png")
    );
    assert!(store.join(format!("records/{id}.json")).exists());
    assert!(store
        .join(format!("iris_crops/{id}_iris_left_face.png"))
        .exists());
    // Pretty output spans several lines.
    assert!(String::from_utf8_lossy(&output.stdout).lines().count() > 1);
}

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

struct TempHome {
    dir: TempDir,
}

impl TempHome {
    fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let mirror = dir.path().join("sd");
        fs::create_dir_all(mirror.join("DATALOG").join("20230102")).unwrap();
        fs::write(mirror.join("STR.edf"), b"summary").unwrap();
        fs::write(mirror.join("DATALOG").join("20230102").join("BRP.edf"), b"x").unwrap();
        Self { dir }
    }

    fn mirror(&self) -> PathBuf {
        self.dir.path().join("sd")
    }

    fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("sleephq-sync").expect("binary built");
        cmd.env("HOME", self.dir.path());
        if cfg!(windows) {
            cmd.env("USERPROFILE", self.dir.path());
        }
        cmd.env("RUST_LOG", "off");
        cmd.env("SLEEPHQ_CLIENT_ID", "client-id");
        cmd.env("SLEEPHQ_CLIENT_SECRET", "client-secret");
        // nothing listens on the discard port
        cmd.env("SLEEPHQ_BASE_URL", "http://127.0.0.1:9");
        cmd.env_remove("SLEEPHQ_PASSWORD");
        cmd.env_remove("SLEEPHQ_USERNAME");
        cmd
    }
}

#[test]
fn upload_without_changes_is_a_successful_no_op() {
    let home = TempHome::new();
    home.command()
        .args(["upload", "--mirror-root"])
        .arg(home.mirror())
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to upload"));
}

#[test]
fn upload_without_login_and_prompting_disabled_fails() {
    let home = TempHome::new();
    home.command()
        .args(["upload", "--no-prompt", "--mirror-root"])
        .arg(home.mirror())
        .args(["--changed", "DATALOG/20230102/BRP.edf"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("authentication failed"));
}

#[test]
fn missing_client_credentials_are_reported() {
    let home = TempHome::new();
    home.command()
        .env_remove("SLEEPHQ_CLIENT_ID")
        .args(["upload", "--force", "--mirror-root"])
        .arg(home.mirror())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("[Configuration]"))
        .stderr(predicate::str::contains("client_id is required"))
        .stderr(predicate::str::contains("Fix the settings"));
}

#[test]
fn state_directory_is_created_and_log_file_written() {
    let home = TempHome::new();
    let log_file = home.dir.path().join("logs").join("run.log");

    home.command()
        .args(["status", "--log-level", "debug", "--log-file"])
        .arg(&log_file)
        .assert()
        .success();

    assert!(home
        .dir
        .path()
        .join(".config")
        .join("sleephq-sync")
        .is_dir());
    let logged = fs::read_to_string(&log_file).unwrap();
    assert!(logged.contains("Logger initialized"));
}

#[test]
fn status_reports_missing_login() {
    let home = TempHome::new();
    home.command()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("not authenticated"))
        .stdout(predicate::str::contains("Recorded uploads: 0"));
}

#[test]
fn history_count_starts_at_zero() {
    let home = TempHome::new();
    home.command()
        .args(["history", "count"])
        .assert()
        .success()
        .stdout(predicate::str::diff("0\n"));
}

#[test]
fn mirror_root_can_come_from_settings_file() {
    let home = TempHome::new();
    let settings = home.dir.path().join("custom.json");
    fs::write(
        &settings,
        serde_json::json!({ "mirror_root": home.mirror() }).to_string(),
    )
    .unwrap();

    home.command()
        .arg("--config")
        .arg(&settings)
        .arg("upload")
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to upload"));
}

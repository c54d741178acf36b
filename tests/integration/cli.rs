use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

/// `zend` with an empty settings file and no inherited overrides.
fn zend(dir: &Path) -> Command {
    let settings = dir.join("config.toml");
    if !settings.exists() {
        std::fs::write(&settings, "").unwrap();
    }

    let mut cmd = Command::cargo_bin("zend").unwrap();
    cmd.env_remove("ZEND_CONFIG")
        .env_remove("ZEND_APPS_ROOT")
        .env_remove("ZEND_SETUP_FILE")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(&settings);
    cmd
}

#[test]
fn test_path_prints_install_dir() {
    let temp = TempDir::new().unwrap();

    zend(temp.path())
        .args(["path", "Owner/App", "v1.2.0", "--apps-root", "/srv/apps"])
        .assert()
        .success()
        .stdout("/srv/apps/owner-app-1.2.0\n");
}

#[test]
fn test_path_uses_configured_apps_root() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("config.toml"), "apps_root = \"/data/apps\"\n").unwrap();

    zend(temp.path())
        .args(["path", "acme/tool", "2.0"])
        .assert()
        .success()
        .stdout("/data/apps/acme-tool-2.0\n");
}

#[test]
fn test_run_once_with_missing_setup_skips_cycle() {
    let temp = TempDir::new().unwrap();

    zend(temp.path())
        .arg("run")
        .arg("--once")
        .arg("--apps-root")
        .arg(temp.path().join("apps"))
        .arg("--setup-file")
        .arg(temp.path().join("missing.json"))
        .assert()
        .success()
        .stderr(predicate::str::contains("Skipping update cycle"));
}

#[test]
fn test_run_once_reports_unsupported_provider() {
    let temp = TempDir::new().unwrap();
    let setup = temp.path().join("setup.json");
    std::fs::write(
        &setup,
        r#"{"githubToken": "ghp_test", "apps": [{"provider": "bitbucket", "key": "acme/tool", "command": "./tool"}]}"#,
    )
    .unwrap();

    zend(temp.path())
        .arg("run")
        .arg("--once")
        .arg("--apps-root")
        .arg(temp.path().join("apps"))
        .arg("--setup-file")
        .arg(&setup)
        .assert()
        .success()
        .stderr(predicate::str::contains("Unsupported provider 'bitbucket'"));

    assert!(!temp.path().join("apps").join("acme-tool").exists());
}

#[test]
fn test_invalid_settings_fail() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("config.toml"), "check_interval_secs = \"soon\"\n").unwrap();

    zend(temp.path())
        .args(["path", "acme/tool", "v1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"))
        .stderr(predicate::str::contains("Failed to parse settings"));
}

#[test]
fn test_zero_interval_is_rejected() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("config.toml"), "check_interval_secs = 0\n").unwrap();

    zend(temp.path())
        .args(["run", "--once"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("check_interval_secs"));
}

#[test]
fn test_verbose_and_quiet_conflict() {
    let temp = TempDir::new().unwrap();

    zend(temp.path())
        .args(["-v", "-q", "path", "acme/tool", "v1"])
        .assert()
        .failure();
}

use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use zend::config::SetupFile;
use zend::core::{ResolutionFailure, ZenError};
use zend::installer::install_path;
use zend::release::GitHubClient;
use zend::supervisor::{ProcessControl, ProcessSupervisor, SignalControl};
use zend::test_utils::{ArchiveEntry, TestHttpServer, init_test_logging, tar_gz_archive};
use zend::updater::{AppOutcome, CycleReport, Updater};

const APP: &str = "acme/web-server";

struct Daemon {
    root: TempDir,
    server: TestHttpServer,
    updater: Updater<SetupFile, GitHubClient>,
}

impl Daemon {
    async fn start(setup: serde_json::Value) -> Self {
        init_test_logging(None);
        let root = TempDir::new().unwrap();
        let setup_path = root.path().join("setup.json");
        std::fs::write(&setup_path, setup.to_string()).unwrap();

        let server = TestHttpServer::start().await.unwrap();
        let client =
            GitHubClient::new(server.url(), Duration::from_secs(5), Duration::from_secs(5))
                .unwrap();
        let updater = Updater::new(
            SetupFile::new(&setup_path),
            client,
            Arc::new(ProcessSupervisor::new()),
            root.path().join("apps"),
        );

        Self {
            root,
            server,
            updater,
        }
    }

    fn publish(&self, repo: &str, tag: &str, script: &str) {
        let asset = format!("/download/{repo}/{tag}/server.tar.gz");
        self.server.route(
            &asset,
            200,
            tar_gz_archive(&[
                ArchiveEntry::dir("bin/"),
                ArchiveEntry::file("bin/server", script, 0o755),
            ]),
        );
        self.server.json_route(
            &format!("/repos/{repo}/releases/latest"),
            200,
            &json!({
                "tag_name": tag,
                "assets": [
                    {"name": "server.tar.gz", "browser_download_url": format!("{}{asset}", self.server.url())}
                ]
            }),
        );
    }

    fn install_dir(&self, repo: &str, tag: &str) -> std::path::PathBuf {
        install_path(&self.root.path().join("apps"), repo, tag)
    }

    fn downloads(&self) -> usize {
        self.server.requests().iter().filter(|r| r.path.starts_with("/download/")).count()
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        self.updater.supervisor().stop_all();
    }
}

fn setup(apps: serde_json::Value) -> serde_json::Value {
    json!({
        "username": "admin",
        "password": "$2a$10$hash",
        "githubToken": "ghp_test",
        "apps": apps
    })
}

fn wait_for_log(dir: &Path, needle: &str) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if std::fs::read_to_string(dir.join("log.txt")).is_ok_and(|log| log.contains(needle)) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}

fn only_outcome(report: CycleReport) -> Result<AppOutcome, ZenError> {
    let CycleReport::Completed(mut apps) = report else {
        panic!("cycle was skipped");
    };
    assert_eq!(apps.len(), 1);
    apps.remove(0).result
}

#[tokio::test]
async fn test_install_start_and_upgrade() {
    let daemon = Daemon::start(setup(json!([
        {"provider": "github", "key": APP, "command": "./bin/server"}
    ])))
    .await;
    daemon.publish(APP, "v1.0.0", "#!/bin/sh\necho serving v1\nexec sleep 30\n");

    // First cycle installs and starts
    let outcome = only_outcome(daemon.updater.run_cycle().await).unwrap();
    let &AppOutcome::Started { pid: v1_pid, installed: true, .. } = &outcome else {
        panic!("expected a fresh start, got {outcome:?}");
    };
    let v1_dir = daemon.install_dir(APP, "v1.0.0");
    assert!(v1_dir.ends_with("acme-web-server-1.0.0"));
    assert!(wait_for_log(&v1_dir, "serving v1"));

    // Second cycle finds it converged
    let outcome = only_outcome(daemon.updater.run_cycle().await).unwrap();
    assert_eq!(outcome, AppOutcome::AlreadyRunning { version: "v1.0.0".to_string() });
    assert_eq!(daemon.downloads(), 1);

    // A new release replaces the running process
    daemon.publish(APP, "v1.1.0", "#!/bin/sh\necho serving v1.1\nexec sleep 30\n");
    let outcome = only_outcome(daemon.updater.run_cycle().await).unwrap();
    let AppOutcome::Started { pid, replaced, .. } = &outcome else {
        panic!("expected a restart, got {outcome:?}");
    };
    assert_eq!(replaced.as_deref(), Some("v1.0.0"));
    assert!(!SignalControl.is_alive(v1_pid));
    assert!(SignalControl.is_alive(*pid));
    assert!(wait_for_log(&daemon.install_dir(APP, "v1.1.0"), "serving v1.1"));

    let record = daemon.updater.supervisor().get_process(APP).unwrap();
    assert_eq!(record.version, "v1.1.0");
    assert_eq!(daemon.downloads(), 2);
}

#[tokio::test]
async fn test_failures_are_isolated_per_app() {
    let daemon = Daemon::start(setup(json!([
        {"provider": "gitlab", "key": "acme/elsewhere", "command": ""},
        {"provider": "github", "key": "acme/private", "command": ""},
        {"provider": "github", "key": APP}
    ])))
    .await;
    daemon.server.json_route(
        "/repos/acme/private/releases/latest",
        403,
        &json!({"message": "Resource not accessible"}),
    );
    daemon.publish(APP, "v2.0.0", "#!/bin/sh\n");

    let report = daemon.updater.run_cycle().await;

    let apps = report.apps();
    assert_eq!(apps.len(), 3);
    assert!(matches!(apps[0].result, Err(ZenError::UnsupportedProvider { .. })));
    assert!(matches!(
        apps[1].result,
        Err(ZenError::ReleaseResolution {
            failure: ResolutionFailure::Status(403),
            ..
        })
    ));
    assert!(matches!(apps[2].result, Ok(AppOutcome::Ready { installed: true, .. })));
    assert!(daemon.install_dir(APP, "v2.0.0").join("bin/server").is_file());
    assert_eq!(daemon.server.hits("/repos/acme/elsewhere/releases/latest"), 0);
}

#[tokio::test]
async fn test_empty_token_skips_cycle() {
    let daemon = Daemon::start(json!({
        "githubToken": "",
        "apps": [{"provider": "github", "key": APP, "command": "./bin/server"}]
    }))
    .await;

    let report = daemon.updater.run_cycle().await;

    assert!(matches!(report, CycleReport::Skipped(ZenError::ConfigError { .. })));
    assert!(daemon.server.requests().is_empty());
}

#[tokio::test]
async fn test_shutdown_stops_all_processes() {
    let daemon = Daemon::start(setup(json!([
        {"provider": "github", "key": APP, "command": "./bin/server"},
        {"provider": "github", "key": "acme/worker", "command": "./bin/server"}
    ])))
    .await;
    daemon.publish(APP, "v1.0.0", "#!/bin/sh\nexec sleep 30\n");
    daemon.publish("acme/worker", "v0.3.0", "#!/bin/sh\nexec sleep 30\n");

    let report = daemon.updater.run_cycle().await;
    assert_eq!(report.failures(), 0);
    let pids: Vec<u32> = daemon.updater.supervisor().records().iter().map(|r| r.pid).collect();
    assert_eq!(pids.len(), 2);

    let supervisor = Arc::clone(daemon.updater.supervisor());
    let stopped = tokio::task::spawn_blocking(move || supervisor.stop_all()).await.unwrap();

    assert_eq!(stopped, 2);
    assert!(pids.iter().all(|pid| !SignalControl.is_alive(*pid)));
}

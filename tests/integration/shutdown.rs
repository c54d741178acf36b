use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use serde_json::json;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use zend::test_utils::{
    ArchiveEntry, TestHttpServer, init_test_logging, process_exited, read_pid_file,
    tar_gz_archive,
};

const APP: &str = "acme/web";

async fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    condition()
}

async fn wait_for_exit(child: &mut Child, timeout: Duration) -> Option<ExitStatus> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(status) = child.try_wait().unwrap() {
            return Some(status);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    None
}

fn write_settings(dir: &Path, api_url: &str) -> std::path::PathBuf {
    let settings = dir.join("config.toml");
    let toml = format!(
        "apps_root = {:?}\nsetup_file = {:?}\napi_url = {:?}\ncheck_interval_secs = 3600\n",
        dir.join("apps").display().to_string(),
        dir.join("setup.json").display().to_string(),
        api_url,
    );
    std::fs::write(&settings, toml).unwrap();
    settings
}

fn spawn_daemon(settings: &Path) -> Child {
    Command::new(assert_cmd::cargo::cargo_bin("zend"))
        .env_remove("ZEND_CONFIG")
        .env_remove("ZEND_APPS_ROOT")
        .env_remove("ZEND_SETUP_FILE")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(settings)
        .arg("run")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap()
}

async fn assert_signal_stops_apps(sig: Signal, name: &str) {
    init_test_logging(None);
    let temp = TempDir::new().unwrap();
    let server = TestHttpServer::start().await.unwrap();
    server.route(
        "/download/web.tar.gz",
        200,
        tar_gz_archive(&[ArchiveEntry::file(
            "server",
            "#!/bin/sh\necho $$ > server.pid\nexec sleep 30\n",
            0o755,
        )]),
    );
    server.json_route(
        &format!("/repos/{APP}/releases/latest"),
        200,
        &json!({
            "tag_name": "v1.0.0",
            "assets": [{"name": "web.tar.gz", "browser_download_url": format!("{}/download/web.tar.gz", server.url())}]
        }),
    );
    std::fs::write(
        temp.path().join("setup.json"),
        json!({"githubToken": "ghp_test", "apps": [{"provider": "github", "key": APP, "command": "./server"}]})
            .to_string(),
    )
    .unwrap();

    let settings = write_settings(temp.path(), &server.url());
    let mut daemon = spawn_daemon(&settings);

    let pid_file = temp.path().join("apps/acme-web-1.0.0/server.pid");
    let started = wait_for(Duration::from_secs(20), || {
        std::fs::read_to_string(&pid_file).is_ok_and(|pid| pid.ends_with('\n'))
    })
    .await;
    if !started {
        let _ = daemon.kill();
        panic!("app was not started by the daemon");
    }
    let app_pid = read_pid_file(&pid_file);
    assert!(!process_exited(app_pid));

    let daemon_pid = Pid::from_raw(i32::try_from(daemon.id()).unwrap());
    signal::kill(daemon_pid, sig).unwrap();

    let Some(status) = wait_for_exit(&mut daemon, Duration::from_secs(15)).await else {
        let _ = daemon.kill();
        panic!("daemon did not exit after {name}");
    };
    let mut stderr = String::new();
    daemon.stderr.take().unwrap().read_to_string(&mut stderr).unwrap();

    assert!(status.success(), "exit status {status}, stderr:\n{stderr}");
    assert!(stderr.contains(&format!("Received {name}")), "stderr:\n{stderr}");
    assert!(stderr.contains("Stopped 1 supervised processes"), "stderr:\n{stderr}");
    assert!(wait_for(Duration::from_secs(5), || process_exited(app_pid)).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sigterm_stops_supervised_apps() {
    assert_signal_stops_apps(Signal::SIGTERM, "SIGTERM").await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sigint_stops_supervised_apps() {
    assert_signal_stops_apps(Signal::SIGINT, "SIGINT").await;
}

//! Supervision of app processes.
//!
//! [`ProcessSupervisor`] keeps at most one process per app key. It is shared
//! through an `Arc` between the update loop and the shutdown path, and every
//! operation takes the registry lock, so a shutdown arriving mid-cycle either
//! sees a process before it is replaced or after the replacement is tracked.
//!
//! Commands run as `sh -c <command>` inside the install directory, in a new
//! process group, with stdout and stderr appended to `log.txt` there. Each
//! child gets a reaper thread that waits on the shell, so a leader that exits
//! on its own does not linger as a zombie.
//!
//! The process group is the unit of supervision. An app is running while any
//! member of its group is alive, which covers commands such as `./server &`
//! whose shell exits right away.
//!
//! Stopping is best effort. `SIGTERM` goes to the process group first; if the
//! group has not exited after the stop timeout, or `SIGTERM` cannot be
//! delivered, `SIGKILL` follows. The record is removed either way and stop
//! failures are only logged.

mod control;


pub use control::{ProcessControl, SignalControl};

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::constants::{PROCESS_LOG_FILE, STOP_TIMEOUT};
use crate::core::ZenError;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A supervised process.
#[derive(Debug, Clone)]
pub struct ProcessRecord {
    /// OS process id of the shell, which is also the process group id.
    pub pid: u32,
    /// Key of the app the process runs.
    pub app_key: String,
    /// Release tag the process was started from.
    pub version: String,
    /// Install directory the process runs in.
    pub install_path: PathBuf,
    exited: Arc<AtomicBool>,
}

impl ProcessRecord {
    /// Whether the reaper has seen the group leader exit. Processes the
    /// leader started in the background may still be running.
    #[must_use]
    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }
}

/// Registry of one supervised process per app.
#[derive(Debug)]
pub struct ProcessSupervisor<C = SignalControl> {
    control: C,
    processes: Mutex<HashMap<String, ProcessRecord>>,
    stop_timeout: Duration,
}

impl ProcessSupervisor {
    /// Supervisor using POSIX signals.
    #[must_use]
    pub fn new() -> Self {
        Self::with_control(SignalControl)
    }
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ProcessControl> ProcessSupervisor<C> {
    /// Supervisor using a custom [`ProcessControl`].
    pub fn with_control(control: C) -> Self {
        Self {
            control,
            processes: Mutex::new(HashMap::new()),
            stop_timeout: STOP_TIMEOUT,
        }
    }

    /// Set how long a process may take to exit after `SIGTERM`.
    #[must_use]
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Start `command` for `app_key`, replacing any tracked process.
    ///
    /// A tracked process that is still alive is stopped before the new one is
    /// spawned; the registry stays locked throughout, so two live processes
    /// are never tracked for the same key.
    ///
    /// # Errors
    ///
    /// [`ZenError::ProcessSpawn`] when `work_dir/log.txt` cannot be opened or
    /// the shell cannot be launched.
    pub fn start(
        &self,
        app_key: &str,
        version: &str,
        command: &str,
        work_dir: &Path,
    ) -> Result<ProcessRecord, ZenError> {
        let mut processes = self.processes.lock();

        if let Some(previous) = processes.remove(app_key) {
            if self.record_alive(&previous) {
                debug!(app = %app_key, pid = previous.pid, "Superseding running process");
                self.stop_record(&previous);
            }
        }

        let record = self.spawn(app_key, version, command, work_dir)?;
        info!(
            app = %app_key,
            version = %version,
            pid = record.pid,
            "Started process in {}",
            work_dir.display()
        );
        processes.insert(app_key.to_string(), record.clone());
        Ok(record)
    }

    /// Stop the process tracked for `app_key`.
    ///
    /// Returns the removed record, or `None` when nothing was tracked. The
    /// record is removed even if the process could not be signalled.
    pub fn stop(&self, app_key: &str) -> Option<ProcessRecord> {
        let mut processes = self.processes.lock();
        let record = processes.remove(app_key)?;
        self.stop_record(&record);
        Some(record)
    }

    /// Stop every tracked process, returning how many records were removed.
    pub fn stop_all(&self) -> usize {
        let mut processes = self.processes.lock();
        let mut records: Vec<ProcessRecord> = processes.drain().map(|(_, record)| record).collect();
        records.sort_by(|a, b| a.app_key.cmp(&b.app_key));

        for record in &records {
            self.stop_record(record);
        }
        records.len()
    }

    /// Whether any process of the group tracked for `app_key` is alive.
    ///
    /// `false` when nothing is tracked, when the whole group has exited, or
    /// when the liveness probe fails for any reason.
    pub fn is_running(&self, app_key: &str) -> bool {
        self.processes.lock().get(app_key).is_some_and(|record| self.record_alive(record))
    }

    /// The record tracked for `app_key`.
    ///
    /// # Errors
    ///
    /// [`ZenError::NotFound`] when nothing is tracked for the app.
    pub fn get_process(&self, app_key: &str) -> Result<ProcessRecord, ZenError> {
        self.processes.lock().get(app_key).cloned().ok_or_else(|| ZenError::NotFound {
            app: app_key.to_string(),
        })
    }

    /// All tracked records, sorted by app key.
    pub fn records(&self) -> Vec<ProcessRecord> {
        let mut records: Vec<ProcessRecord> = self.processes.lock().values().cloned().collect();
        records.sort_by(|a, b| a.app_key.cmp(&b.app_key));
        records
    }

    fn record_alive(&self, record: &ProcessRecord) -> bool {
        self.control.is_alive(record.pid)
    }

    fn spawn(
        &self,
        app_key: &str,
        version: &str,
        command: &str,
        work_dir: &Path,
    ) -> Result<ProcessRecord, ZenError> {
        let spawn_error = |reason: String| ZenError::ProcessSpawn {
            app: app_key.to_string(),
            command: command.to_string(),
            reason,
        };

        let log_path = work_dir.join(PROCESS_LOG_FILE);
        let stdout = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|e| spawn_error(format!("cannot open {}: {e}", log_path.display())))?;
        let stderr = stdout
            .try_clone()
            .map_err(|e| spawn_error(format!("cannot open {}: {e}", log_path.display())))?;

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = cmd.spawn().map_err(|e| spawn_error(e.to_string()))?;
        let pid = child.id();
        let exited = Arc::new(AtomicBool::new(false));

        let reaped = Arc::clone(&exited);
        let app = app_key.to_string();
        thread::Builder::new()
            .name(format!("reap-{pid}"))
            .spawn(move || {
                match child.wait() {
                    Ok(status) => debug!(app = %app, pid, "Process exited: {status}"),
                    Err(e) => warn!(app = %app, pid, "Failed to wait for process: {e}"),
                }
                reaped.store(true, Ordering::SeqCst);
            })
            .map_err(|e| spawn_error(format!("cannot start reaper thread: {e}")))?;

        Ok(ProcessRecord {
            pid,
            app_key: app_key.to_string(),
            version: version.to_string(),
            install_path: work_dir.to_path_buf(),
            exited,
        })
    }

    fn stop_record(&self, record: &ProcessRecord) {
        if !self.record_alive(record) {
            debug!(app = %record.app_key, pid = record.pid, "Process group already exited");
            return;
        }

        info!(app = %record.app_key, version = %record.version, pid = record.pid, "Stopping process");
        let result = match self.control.terminate(record.pid) {
            Ok(()) if self.wait_for_exit(record) => Ok(()),
            Ok(()) => {
                warn!(
                    app = %record.app_key,
                    pid = record.pid,
                    "Process did not exit within {:?}, killing",
                    self.stop_timeout
                );
                self.control.kill(record.pid)
            }
            Err(term_error) => {
                debug!(app = %record.app_key, pid = record.pid, "SIGTERM failed: {term_error}");
                self.control.kill(record.pid).map_err(|kill_error| {
                    std::io::Error::other(format!("SIGTERM: {term_error}; SIGKILL: {kill_error}"))
                })
            }
        };

        if let Err(e) = result {
            let error = ZenError::ProcessStop {
                app: record.app_key.clone(),
                pid: record.pid,
                reason: e.to_string(),
            };
            warn!("{error}");
        }
    }

    fn wait_for_exit(&self, record: &ProcessRecord) -> bool {
        let deadline = Instant::now() + self.stop_timeout;
        while Instant::now() < deadline {
            if !self.record_alive(record) {
                return true;
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
        !self.record_alive(record)
    }
}

//! OS-level process control.

use std::io;

/// Liveness probe and stop signals for supervised processes.
///
/// The supervisor only talks to the operating system through this trait, so
/// its bookkeeping can be exercised with a recording implementation.
pub trait ProcessControl: Send + Sync {
    /// Whether any process of the group led by `pid` exists. Any probe
    /// failure means `false`.
    fn is_alive(&self, pid: u32) -> bool;

    /// Ask the group led by `pid` to exit.
    fn terminate(&self, pid: u32) -> io::Result<()>;

    /// Force the group led by `pid` to exit.
    fn kill(&self, pid: u32) -> io::Result<()>;
}

/// [`ProcessControl`] using POSIX signals.
///
/// Supervised commands run as process group leaders, so every operation
/// targets the whole group: liveness is the null signal sent with `killpg`,
/// stopping is `SIGTERM` or `SIGKILL`. A group outlives its leader while
/// anything the shell backgrounded is still running, and its id cannot be
/// handed out as a new pid until the last member is gone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalControl;

#[cfg(unix)]
mod unix {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;
    use std::io;

    use super::{ProcessControl, SignalControl};

    fn to_pgid(pid: u32) -> Option<Pid> {
        i32::try_from(pid).ok().filter(|raw| *raw > 1).map(Pid::from_raw)
    }

    fn signal_group(pid: u32, sig: Option<Signal>) -> io::Result<()> {
        let pgid = to_pgid(pid).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("invalid process group {pid}"))
        })?;
        signal::killpg(pgid, sig).map_err(io::Error::from)
    }

    impl ProcessControl for SignalControl {
        fn is_alive(&self, pid: u32) -> bool {
            signal_group(pid, None).is_ok()
        }

        fn terminate(&self, pid: u32) -> io::Result<()> {
            signal_group(pid, Some(Signal::SIGTERM))
        }

        fn kill(&self, pid: u32) -> io::Result<()> {
            signal_group(pid, Some(Signal::SIGKILL))
        }
    }
}

#[cfg(not(unix))]
impl ProcessControl for SignalControl {
    fn is_alive(&self, _pid: u32) -> bool {
        false
    }

    fn terminate(&self, _pid: u32) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "process signals require a Unix host"))
    }

    fn kill(&self, pid: u32) -> io::Result<()> {
        self.terminate(pid)
    }
}

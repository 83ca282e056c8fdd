//! Process helpers for the transcoder child.
//!
//! Children are spawned detached from the terminal's process group so that a
//! Ctrl+C at the console reaches only the parent, which then decides how and
//! when the child is stopped.

use std::ffi::OsStr;
use std::io;

use tokio::process::{Child, Command};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Spawn-time flags applied to every transcoder command.
pub trait SpawnExt {
    /// Apply the Windows `CREATE_NO_WINDOW` flag. No-op elsewhere.
    fn no_window(&mut self) -> &mut Self;

    /// Put the child in its own process group (Unix only).
    fn own_process_group(&mut self) -> &mut Self;
}

impl SpawnExt for Command {
    fn no_window(&mut self) -> &mut Self {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.as_std_mut().creation_flags(CREATE_NO_WINDOW);
        }
        self
    }

    fn own_process_group(&mut self) -> &mut Self {
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            self.as_std_mut().process_group(0);
        }
        self
    }
}

/// Create a `tokio::process::Command` for a long-running child.
///
/// The child gets no console window on Windows and its own process group on
/// Unix. It is killed if its handle is dropped while still running.
pub fn tokio_command(program: impl AsRef<OsStr>) -> Command {
    let mut cmd = Command::new(program);
    cmd.no_window().own_process_group();
    cmd.kill_on_drop(true);
    cmd
}

/// Ask a child to terminate.
///
/// On Unix this sends `SIGTERM` and leaves the child running until it exits
/// on its own. Other platforms have no polite request, so the child is killed
/// outright.
///
/// Returns `Ok(false)` when the child had already exited.
pub fn request_termination(child: &mut Child) -> io::Result<bool> {
    let Some(pid) = child.id() else {
        return Ok(false);
    };

    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let pid = i32::try_from(pid)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
        match kill(Pid::from_raw(pid), Signal::SIGTERM) {
            Ok(()) => Ok(true),
            Err(Errno::ESRCH) => Ok(false),
            Err(errno) => Err(io::Error::from(errno)),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        child.start_kill().map(|_| true)
    }
}

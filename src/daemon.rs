//! Standard descriptor handling when the monitor goes into the background.
//!
//! When logging away from the terminal, stdin/stdout/stderr are pointed at the
//! null device and kept open across `exec` so a relaunched image inherits them.
//! When logging to standard output they stay attached but are closed on `exec`
//! so later children do not inherit the terminal.
use std::{
    fs::OpenOptions,
    io,
    os::fd::{IntoRawFd, RawFd},
};

use nix::errno::Errno;
use tracing::debug;

use crate::{
    constants::{COMPONENT, NULL_DEVICE},
    error::DaemonIoError,
};

/// The three descriptors treated as standard input, output and error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StdDescriptors {
    pub stdin: RawFd,
    pub stdout: RawFd,
    pub stderr: RawFd,
}

impl Default for StdDescriptors {
    fn default() -> Self {
        Self {
            stdin: libc::STDIN_FILENO,
            stdout: libc::STDOUT_FILENO,
            stderr: libc::STDERR_FILENO,
        }
    }
}

impl StdDescriptors {
    pub fn all(&self) -> [RawFd; 3] {
        [self.stdin, self.stdout, self.stderr]
    }
}

/// Where the standard descriptors ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonIo {
    /// Connected to the null device and inherited across `exec`.
    Redirected,
    /// Left on the terminal and closed on `exec`.
    Attached,
}

/// Applies the descriptor policy to the process's real stdio.
pub fn apply(standard_output_logging: bool) -> Result<DaemonIo, DaemonIoError> {
    apply_to(StdDescriptors::default(), standard_output_logging)
}

/// Applies the descriptor policy to `fds`.
pub fn apply_to(
    fds: StdDescriptors,
    standard_output_logging: bool,
) -> Result<DaemonIo, DaemonIoError> {
    if standard_output_logging {
        for fd in fds.all() {
            set_close_on_exec(fd, true)?;
        }
        debug!(target: COMPONENT, "Standard descriptors kept, closed on exec");
        return Ok(DaemonIo::Attached);
    }

    redirect_to_null(fds)?;
    for fd in fds.all() {
        set_close_on_exec(fd, false)?;
    }
    debug!(target: COMPONENT, "Standard descriptors redirected to {NULL_DEVICE}");
    Ok(DaemonIo::Redirected)
}

fn redirect_to_null(fds: StdDescriptors) -> Result<(), DaemonIoError> {
    let null = OpenOptions::new()
        .read(true)
        .write(true)
        .open(NULL_DEVICE)
        .map_err(DaemonIoError::OpenNull)?
        .into_raw_fd();

    let targets = fds.all();
    let result = targets.iter().try_for_each(|&target| {
        if target == null {
            return Ok(());
        }
        Errno::result(unsafe { libc::dup2(null, target) })
            .map(drop)
            .map_err(|errno| DaemonIoError::Redirect {
                fd: target,
                source: io::Error::from(errno),
            })
    });

    // The null device may have landed on a closed standard slot.
    if !targets.contains(&null) {
        unsafe { libc::close(null) };
    }

    result
}

/// Sets or clears `FD_CLOEXEC`, leaving other descriptor flags untouched.
pub fn set_close_on_exec(fd: RawFd, enabled: bool) -> Result<(), DaemonIoError> {
    let flags_error = |errno: Errno| DaemonIoError::Flags {
        fd,
        source: io::Error::from(errno),
    };

    let flags = Errno::result(unsafe { libc::fcntl(fd, libc::F_GETFD) }).map_err(flags_error)?;
    let updated = if enabled {
        flags | libc::FD_CLOEXEC
    } else {
        flags & !libc::FD_CLOEXEC
    };

    Errno::result(unsafe { libc::fcntl(fd, libc::F_SETFD, updated) }).map_err(flags_error)?;
    Ok(())
}

/// Reports whether `fd` is closed on `exec`.
pub fn close_on_exec(fd: RawFd) -> io::Result<bool> {
    let flags = Errno::result(unsafe { libc::fcntl(fd, libc::F_GETFD) })?;
    Ok(flags & libc::FD_CLOEXEC != 0)
}

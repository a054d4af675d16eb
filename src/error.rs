//! Error handling for the monitor daemon.
use std::{io, os::fd::RawFd, path::PathBuf};

use nix::errno::Errno;
use thiserror::Error;

use crate::signals::SignalState;

/// Fatal startup failure, one variant per stage of the startup sequence.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The configuration file could not be loaded.
    #[error("Error reading configuration file: {0}")]
    Config(#[from] ConfigError),

    /// The log backend could not be activated.
    #[error("Error initializing log system: {0}")]
    Log(#[from] LogError),

    /// Standard descriptors could not be redirected or flagged.
    #[error("Error redirecting standard descriptors: {0}")]
    Io(#[from] DaemonIoError),

    /// The signal mask could not be applied or waited on.
    #[error("Error setting up signal mask: {0}")]
    Signal(#[from] SignalSetupError),

    /// The monitor loop thread could not be spawned.
    #[error("Could not start monitor loop: {0}")]
    WorkerStart(#[source] io::Error),
}

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file is missing or unreadable.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        /// Path that was read.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid template syntax.
    #[error("syntax error in {} at line {line}: {message}", .path.display())]
    Parse {
        /// Path of the offending file.
        path: PathBuf,
        /// 1-based line of the error.
        line: usize,
        /// What the parser expected.
        message: String,
    },

    /// A required attribute is absent.
    #[error("missing required attribute {0}")]
    MissingAttribute(String),

    /// An attribute that must be a vector was given a single value.
    #[error("attribute {0} must be a vector attribute")]
    ExpectedVector(String),
}

/// Error type for log system activation.
#[derive(Debug, Error)]
pub enum LogError {
    /// `LOG/SYSTEM` does not name a known backend.
    #[error("Unknown LOG_SYSTEM")]
    UnknownSystem,

    /// The log destination could not be opened.
    #[error("failed to open log file {}: {source}", .path.display())]
    Open {
        /// Destination that failed to open.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: io::Error,
    },

    /// A process-wide log backend is already installed.
    #[error("log system already initialized")]
    AlreadyActive,
}

/// Error type for standard descriptor redirection.
#[derive(Debug, Error)]
pub enum DaemonIoError {
    /// The null device could not be opened.
    #[error("failed to open null device: {0}")]
    OpenNull(#[source] io::Error),

    /// `dup2` onto a standard descriptor failed.
    #[error("failed to redirect descriptor {fd}: {source}")]
    Redirect {
        /// Target descriptor.
        fd: RawFd,
        /// The underlying error that occurred.
        #[source]
        source: io::Error,
    },

    /// Reading or writing the descriptor flags failed.
    #[error("failed to update flags of descriptor {fd}: {source}")]
    Flags {
        /// Descriptor whose flags were updated.
        fd: RawFd,
        /// The underlying error that occurred.
        #[source]
        source: io::Error,
    },
}

/// Error type for signal mask handling.
#[derive(Debug, Error)]
pub enum SignalSetupError {
    /// `pthread_sigmask` rejected the mask.
    #[error("failed to apply signal mask: {0}")]
    Mask(#[source] Errno),

    /// `sigwait` failed.
    #[error("failed to wait for termination signal: {0}")]
    Wait(#[source] Errno),

    /// A transition was requested from the wrong state.
    #[error("cannot {action} while signal controller is {from:?}")]
    InvalidTransition {
        /// State the controller was in.
        from: SignalState,
        /// Requested operation.
        action: &'static str,
    },
}

//! Startup and lifecycle controller of the cluster monitoring daemon.
//!
//! `onemonitord` reads `monitor.conf`, brings up logging, detaches its standard
//! descriptors, blocks every signal before any thread exists and then waits for
//! `SIGINT` or `SIGTERM` to shut down. The monitor loop itself is plugged in
//! through [`worker::MonitorLoop`].

/// CLI interface.
pub mod cli;

/// Configuration management.
pub mod config;

/// Paths, names and identifiers shared across modules.
pub mod constants;

/// Standard descriptor handling.
pub mod daemon;

/// Error handling.
pub mod error;

/// Log system.
pub mod logs;

/// Startup and shutdown sequencing.
pub mod monitor;

/// Install locations and runtime support libraries.
pub mod runtime;

/// Signal mask handling.
pub mod signals;

/// Monitor loop contract.
pub mod worker;

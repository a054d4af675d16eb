//! Constants and configuration values for the monitor daemon.
//!
//! Centralizes file names, install paths and log identifiers so the startup
//! sequence and its tests agree on a single source of truth.

// ============================================================================
// Install Locations
// ============================================================================

/// Environment variable relocating a self-contained installation.
pub const ONE_LOCATION_ENV: &str = "ONE_LOCATION";

/// Configuration directory of a system-wide installation.
pub const SYSTEM_ETC_DIR: &str = "/etc/one";

/// Log file of a system-wide installation.
pub const SYSTEM_LOG_FILE: &str = "/var/log/one/monitor.log";

/// Configuration directory relative to `ONE_LOCATION`.
pub const LOCAL_ETC_DIR: &str = "etc";

/// Log directory relative to `ONE_LOCATION`.
pub const LOCAL_VAR_DIR: &str = "var";

/// Name of the daemon configuration file inside the configuration directory.
pub const CONFIG_FILE_NAME: &str = "monitor.conf";

/// Name of the daemon log file.
pub const LOG_FILE_NAME: &str = "monitor.log";

// ============================================================================
// Configuration Keys
// ============================================================================

/// Vector attribute holding the log settings.
pub const LOG_SECTION: &str = "LOG";

/// Log backend name inside [`LOG_SECTION`].
pub const LOG_SYSTEM_KEY: &str = "SYSTEM";

/// Numeric verbosity inside [`LOG_SECTION`].
pub const LOG_DEBUG_LEVEL_KEY: &str = "DEBUG_LEVEL";

// ============================================================================
// Logging Identifiers
// ============================================================================

/// Application name handed to the log backend (syslog ident).
pub const APP_NAME: &str = "one_monitor";

/// Component code tagging every daemon log entry.
pub const COMPONENT: &str = "MON";

/// Timestamp layout for file and standard-output log entries.
pub const LOG_TIMESTAMP_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Separator line used by the startup banner.
pub const BANNER_RULE: &str = "----------------------------------------";

// ============================================================================
// Process Management
// ============================================================================

/// Null sink that replaces standard descriptors in daemon mode.
pub const NULL_DEVICE: &str = "/dev/null";

/// Name of the thread running the monitor loop.
pub const WORKER_THREAD_NAME: &str = "monitor-loop";

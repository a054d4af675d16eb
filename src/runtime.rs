//! Install locations and process-wide runtime support.
use std::{
    env,
    ffi::OsString,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, OnceLock},
};

use tracing::debug;

use crate::constants::{
    COMPONENT, CONFIG_FILE_NAME, LOCAL_ETC_DIR, LOCAL_VAR_DIR, LOG_FILE_NAME,
    ONE_LOCATION_ENV, SYSTEM_ETC_DIR, SYSTEM_LOG_FILE,
};

/// Where configuration is read from and where the log is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locations {
    etc_dir: PathBuf,
    log_file: PathBuf,
}

impl Locations {
    /// Resolves locations from `ONE_LOCATION`.
    pub fn from_env() -> Self {
        Self::resolve(env::var_os(ONE_LOCATION_ENV))
    }

    /// Resolves locations from an optional `ONE_LOCATION` value.
    ///
    /// Unset means a system-wide installation under `/etc/one` and
    /// `/var/log/one`. An empty value is treated as the filesystem root.
    pub fn resolve(one_location: Option<OsString>) -> Self {
        match one_location {
            None => Self {
                etc_dir: PathBuf::from(SYSTEM_ETC_DIR),
                log_file: PathBuf::from(SYSTEM_LOG_FILE),
            },
            Some(root) => {
                let root = if root.is_empty() {
                    PathBuf::from("/")
                } else {
                    PathBuf::from(root)
                };

                Self {
                    etc_dir: root.join(LOCAL_ETC_DIR),
                    log_file: root.join(LOCAL_VAR_DIR).join(LOG_FILE_NAME),
                }
            }
        }
    }

    /// Configuration directory.
    pub fn etc_dir(&self) -> &Path {
        &self.etc_dir
    }

    /// Full path of `monitor.conf`.
    pub fn config_file(&self) -> PathBuf {
        self.etc_dir.join(CONFIG_FILE_NAME)
    }

    /// Log file used by the file backend.
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }
}

static CRYPTO_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Process-wide libraries that must be initialized before any thread exists.
///
/// Holds the shared crypto context used by network layers. Created once by the
/// orchestrator after the signal mask is blocked and released on teardown.
#[derive(Debug)]
pub struct RuntimeSupport {
    _private: (),
}

impl RuntimeSupport {
    /// Initializes the crypto library and the lock shared by its users.
    pub fn initialize() -> Self {
        #[cfg(target_os = "linux")]
        openssl_sys::init();

        CRYPTO_LOCK.get_or_init(|| Mutex::new(()));
        debug!(target: COMPONENT, "Runtime support initialized");

        Self { _private: () }
    }

    /// Serializes access to the crypto context.
    ///
    /// Returns `None` until [`RuntimeSupport::initialize`] has run.
    pub fn crypto_lock() -> Option<MutexGuard<'static, ()>> {
        CRYPTO_LOCK
            .get()
            .map(|lock| lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    /// Ends the runtime support phase of teardown.
    ///
    /// Releases nothing: OpenSSL 1.1 and later clean up after themselves at
    /// process exit, and the shared lock stays valid for any straggling reader.
    pub fn shutdown(self) {
        debug!(target: COMPONENT, "Runtime support released");
    }
}

//! Startup and shutdown sequencing of the monitor daemon.
use std::{path::PathBuf, sync::Arc};

use nix::sys::signal::Signal;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::{
    config::Configuration,
    constants::{APP_NAME, COMPONENT},
    daemon::{self, StdDescriptors},
    error::{LogError, MonitorError},
    logs::{self, LogSettings, LogSystem},
    runtime::{Locations, RuntimeSupport},
    signals::SignalController,
    worker::{MonitorLoop, ProcessContext, WorkerThread},
};

/// Teardown actions, recorded in the order they ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStep {
    /// Shutdown token triggered and monitor loop joined.
    StopWorker,
    /// Runtime support libraries released.
    ReleaseRuntime,
    /// Log backend flushed and closed.
    FinalizeLog,
}

/// Outcome of a graceful shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Signal that ended the wait.
    pub signal: Signal,
    /// Teardown actions performed.
    pub teardown: Vec<TeardownStep>,
}

/// Result of validating an installation without starting the daemon.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    /// Configuration file that was read.
    pub config_file: PathBuf,
    /// Log settings startup would activate.
    pub log: LogSettings,
    /// Parsed and validated configuration.
    pub configuration: Configuration,
}

/// Lifecycle controller of the monitor daemon.
pub struct Monitor {
    locations: Locations,
    stdio: StdDescriptors,
    worker: Option<Box<dyn MonitorLoop>>,
    signals: SignalController,
}

impl Monitor {
    /// Controller for the installation at `locations`, on the process's
    /// standard descriptors and without a monitor loop.
    pub fn new(locations: Locations) -> Self {
        Self {
            locations,
            stdio: StdDescriptors::default(),
            worker: None,
            signals: SignalController::new(),
        }
    }

    /// Runs `worker` on its own thread between signal blocking and the wait.
    pub fn with_worker(mut self, worker: impl MonitorLoop) -> Self {
        self.worker = Some(Box::new(worker));
        self
    }

    /// Overrides the descriptors treated as standard input, output and error.
    pub fn with_stdio(mut self, stdio: StdDescriptors) -> Self {
        self.stdio = stdio;
        self
    }

    /// Starts the daemon and blocks until `SIGINT` or `SIGTERM`.
    ///
    /// Fails fast on the first stage error. Errors raised once logging is
    /// active are logged here; earlier ones are left to the caller.
    pub fn start(mut self) -> Result<ShutdownReport, MonitorError> {
        let config = Configuration::load(self.locations.etc_dir())?;

        let settings = LogSettings::derive(&config, self.locations.log_file());
        let log = logs::activate(&settings, APP_NAME)?;

        info!(target: COMPONENT, "Init Monitor Log system");
        info!(target: COMPONENT, "{}", logs::banner(&config));

        match self.run(config, settings) {
            Ok(mut report) => {
                log.finalize();
                report.teardown.push(TeardownStep::FinalizeLog);
                Ok(report)
            }
            Err(err) => {
                error!(target: COMPONENT, "{err}");
                log.finalize();
                Err(err)
            }
        }
    }

    fn run(
        &mut self,
        config: Configuration,
        settings: LogSettings,
    ) -> Result<ShutdownReport, MonitorError> {
        daemon::apply_to(self.stdio, settings.is_standard_output())?;

        self.signals.block_all()?;
        let runtime = RuntimeSupport::initialize();

        let context = ProcessContext::new(Arc::new(config), settings);
        let worker = match self.worker.take() {
            Some(worker) => {
                info!(target: COMPONENT, "Starting monitor loop...");
                Some(WorkerThread::spawn(worker, context.clone()).map_err(MonitorError::WorkerStart)?)
            }
            None => None,
        };

        info!(target: COMPONENT, "Monitor started, waiting for SIGINT or SIGTERM");
        let signal = self.signals.wait_for_termination()?;
        info!(target: COMPONENT, "Received {signal:?}, stopping monitor");

        Ok(ShutdownReport {
            signal,
            teardown: teardown(&context, worker, runtime),
        })
    }
}

fn teardown(
    context: &ProcessContext,
    worker: Option<WorkerThread>,
    runtime: RuntimeSupport,
) -> Vec<TeardownStep> {
    let mut steps = Vec::with_capacity(3);

    context.shutdown().trigger();
    if let Some(worker) = worker
        && !worker.join()
    {
        warn!(target: COMPONENT, "Monitor loop terminated abnormally");
    }
    steps.push(TeardownStep::StopWorker);

    runtime.shutdown();
    steps.push(TeardownStep::ReleaseRuntime);

    steps
}

/// Loads the configuration and derives log settings the way startup would,
/// without activating anything.
pub fn check(locations: &Locations) -> Result<CheckReport, MonitorError> {
    let configuration = Configuration::load(locations.etc_dir())?;
    let log = LogSettings::derive(&configuration, locations.log_file());

    if log.system == LogSystem::Undefined {
        return Err(LogError::UnknownSystem.into());
    }

    Ok(CheckReport {
        config_file: locations.config_file(),
        log,
        configuration,
    })
}

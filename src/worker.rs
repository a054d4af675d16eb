//! Contract between the controller and the monitor loop.
//!
//! The loop itself lives outside this crate. The controller only guarantees
//! that it starts on its own thread after every signal is blocked, receives a
//! [`ProcessContext`], and is joined once the shutdown token fires.
use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
};

use crate::{config::Configuration, constants::WORKER_THREAD_NAME, logs::LogSettings};

/// Cooperative stop request shared between the controller and the worker.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken(Arc<AtomicBool>);

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Process-wide state handed to the worker. Built once by the controller.
#[derive(Debug, Clone)]
pub struct ProcessContext {
    config: Arc<Configuration>,
    log_settings: LogSettings,
    shutdown: ShutdownToken,
}

impl ProcessContext {
    pub fn new(config: Arc<Configuration>, log_settings: LogSettings) -> Self {
        Self {
            config,
            log_settings,
            shutdown: ShutdownToken::new(),
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn log_settings(&self) -> &LogSettings {
        &self.log_settings
    }

    pub fn shutdown(&self) -> &ShutdownToken {
        &self.shutdown
    }
}

/// The monitor loop run on the worker thread.
///
/// Implementations must return once `context.shutdown()` is triggered.
pub trait MonitorLoop: Send + 'static {
    fn run(&mut self, context: ProcessContext);
}

impl<F> MonitorLoop for F
where
    F: FnMut(ProcessContext) + Send + 'static,
{
    fn run(&mut self, context: ProcessContext) {
        self(context)
    }
}

/// Handle to the running monitor loop.
#[derive(Debug)]
pub struct WorkerThread {
    handle: JoinHandle<()>,
}

impl WorkerThread {
    /// Spawns `worker` on the `monitor-loop` thread.
    pub fn spawn(mut worker: Box<dyn MonitorLoop>, context: ProcessContext) -> io::Result<Self> {
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker.run(context))?;
        Ok(Self { handle })
    }

    /// Waits for the loop to return. `false` if it panicked.
    pub fn join(self) -> bool {
        self.handle.join().is_ok()
    }
}

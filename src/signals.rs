//! Signal mask discipline of the controller thread.
//!
//! Every signal is blocked on the controller before any other thread exists,
//! so threads spawned later inherit a fully blocked mask and never receive
//! asynchronous signals. The controller then waits synchronously for
//! `SIGINT` or `SIGTERM`.
use nix::sys::signal::{SigSet, SigmaskHow, Signal, pthread_sigmask};
use tracing::debug;

use crate::{constants::COMPONENT, error::SignalSetupError};

/// Signals that end the daemon. Both lead to the same shutdown.
pub const TERMINATION_SIGNALS: [Signal; 2] = [Signal::SIGINT, Signal::SIGTERM];

/// Lifecycle of the controller's signal mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalState {
    Unblocked,
    FullyBlocked,
    WaitingForTermination,
    Terminated(Signal),
}

/// Owns the signal mask of the thread that drives startup.
#[derive(Debug)]
pub struct SignalController {
    state: SignalState,
}

impl Default for SignalController {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalController {
    pub fn new() -> Self {
        Self {
            state: SignalState::Unblocked,
        }
    }

    pub fn state(&self) -> SignalState {
        self.state
    }

    /// Set waited on by [`SignalController::wait_for_termination`].
    pub fn termination_set() -> SigSet {
        let mut set = SigSet::empty();
        for signal in TERMINATION_SIGNALS {
            set.add(signal);
        }
        set
    }

    /// Blocks every signal on the calling thread.
    ///
    /// Must run before any other thread is spawned.
    pub fn block_all(&mut self) -> Result<(), SignalSetupError> {
        self.require(SignalState::FullyBlocked, "block all signals")?;

        pthread_sigmask(SigmaskHow::SIG_BLOCK, Some(&SigSet::all()), None)
            .map_err(SignalSetupError::Mask)?;

        self.state = SignalState::FullyBlocked;
        debug!(target: COMPONENT, "All signals blocked");
        Ok(())
    }

    /// Waits, without timeout, until `SIGINT` or `SIGTERM` is delivered.
    ///
    /// Any other pending signal is left alone and does not end the wait.
    pub fn wait_for_termination(&mut self) -> Result<Signal, SignalSetupError> {
        self.require(SignalState::WaitingForTermination, "wait for termination")?;

        self.state = SignalState::WaitingForTermination;
        let signal = Self::termination_set()
            .wait()
            .map_err(SignalSetupError::Wait)?;

        self.state = SignalState::Terminated(signal);
        Ok(signal)
    }

    fn require(&self, next: SignalState, action: &'static str) -> Result<(), SignalSetupError> {
        let allowed = matches!(
            (self.state, next),
            (SignalState::Unblocked, SignalState::FullyBlocked)
                | (SignalState::FullyBlocked, SignalState::WaitingForTermination)
        );

        if allowed {
            Ok(())
        } else {
            Err(SignalSetupError::InvalidTransition {
                from: self.state,
                action,
            })
        }
    }
}

//! Per-class initialization state machine.
//!
//! Static constructors run at most once per class. The state machine is a mutex
//! plus condition variable per class: the first thread to arrive claims the
//! transition and records its thread id, a re-entering claimant (direct or via a
//! dependency cycle) proceeds without re-running the initializer, and every other
//! thread blocks on the condition until the claimant finishes. Transitions are
//! monotonic; once `Done` or `Failed` the class never regresses.
//!
//! A failure is absorbing: the recorded message is re-surfaced as
//! [`crate::Error::TypeInitFailed`] on every later attempt, and the initializer
//! is never retried.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::ThreadId;

use crate::Result;

/// Recorded outcome of a failed initializer run.
#[derive(Debug)]
pub(crate) struct InitFailure {
    /// Full name of the failed class
    pub class: String,
    /// Message from the first (and only) initializer run
    pub message: String,
}

#[derive(Debug)]
enum InitState {
    Uninit,
    InProgress(ThreadId),
    Done,
    Failed(Arc<InitFailure>),
}

/// Initialization guard owned by one [`crate::runtime::RuntimeClass`].
#[derive(Debug)]
pub struct ClassInit {
    state: Mutex<InitState>,
    cond: Condvar,
}

impl ClassInit {
    pub(crate) fn new() -> Self {
        ClassInit {
            state: Mutex::new(InitState::Uninit),
            cond: Condvar::new(),
        }
    }

    /// Whether the class has completed initialization successfully.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state
            .lock()
            .map(|state| matches!(*state, InitState::Done))
            .unwrap_or(false)
    }

    /// Drive the state machine, running `run` if this thread wins the claim.
    ///
    /// `run` performs the actual work (static storage allocation plus the static
    /// constructor) and reports failure as a message, which becomes the recorded
    /// absorbing failure.
    ///
    /// # Errors
    /// - [`crate::Error::TypeInitFailed`] if this or an earlier run failed
    /// - [`crate::Error::LockError`] if the guard was poisoned by a panicking
    ///   initializer
    pub(crate) fn ensure<F>(&self, class_name: &str, run: F) -> Result<()>
    where
        F: FnOnce() -> std::result::Result<(), String>,
    {
        let current = std::thread::current().id();

        let mut state = self.state.lock().map_err(|_| crate::Error::LockError)?;
        loop {
            match &*state {
                InitState::Done => return Ok(()),
                InitState::Failed(failure) => {
                    return Err(crate::Error::TypeInitFailed {
                        class: failure.class.clone(),
                        message: failure.message.clone(),
                    })
                }
                InitState::InProgress(owner) if *owner == current => {
                    // Re-entrant request from the initializing thread itself.
                    return Ok(());
                }
                InitState::InProgress(_) => {
                    state = self
                        .cond
                        .wait(state)
                        .map_err(|_| crate::Error::LockError)?;
                }
                InitState::Uninit => break,
            }
        }

        *state = InitState::InProgress(current);
        drop(state);

        let outcome = run();

        let mut state = self.state.lock().map_err(|_| crate::Error::LockError)?;
        let result = match outcome {
            Ok(()) => {
                *state = InitState::Done;
                Ok(())
            }
            Err(message) => {
                let failure = Arc::new(InitFailure {
                    class: class_name.to_string(),
                    message,
                });
                *state = InitState::Failed(Arc::clone(&failure));
                Err(crate::Error::TypeInitFailed {
                    class: failure.class.clone(),
                    message: failure.message.clone(),
                })
            }
        };
        drop(state);
        self.cond.notify_all();

        result
    }
}

//! Module implementing background execution of analyses.
//!
//! Every [`AnalysisRunner`] owns exactly one worker thread and is single-use:
//! `Idle` on creation, `Running` once started, then exactly one of
//! `Completed`, `Failed` or `Cancelled`. The wrapped analysis never runs on
//! the invoking thread, so blocking sample reads stay off it. Cancellation is
//! cooperative, propagated through a [`CancelToken`] shared with the
//! computation and checked between discrete units of work.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::mpsc;
//! use rusty_ephys::analysis::{AnalysisRequest, AnalysisResult};
//! use rusty_ephys::runner::{AnalysisListener, AnalysisRunner, RunnerState};
//! use rusty_ephys::error::EphysError;
//!
//! struct ChannelListener(mpsc::Sender<AnalysisResult>);
//!
//! impl AnalysisListener for ChannelListener {
//!     fn on_done(&self, result: AnalysisResult) {
//!         self.0.send(result).ok();
//!     }
//!     fn on_failed(&self, _error: EphysError) {}
//!     fn on_cancelled(&self) {}
//! }
//!
//! let (tx, rx) = mpsc::channel();
//! let mut runner = AnalysisRunner::new(AnalysisRequest::Autocorrelation { trains: vec![] });
//! assert_eq!(runner.state(), RunnerState::Idle);
//!
//! runner.start(ChannelListener(tx)).unwrap();
//! let result = rx.recv().unwrap();
//! assert_eq!(result, AnalysisResult::Autocorrelation(vec![]));
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use derivative::Derivative;
use log::debug;

use crate::analysis::{AnalysisRequest, AnalysisResult};
use crate::error::EphysError;

/// Shared cancellation flag, checked cooperatively by running analyses.
///
/// Cloning yields a handle to the same flag. Once set, the flag is sticky.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a fresh, unset token.
    pub fn new() -> Self {
        CancelToken::default()
    }

    /// Requests cancellation of every computation holding this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The lifecycle states of an [`AnalysisRunner`].
///
/// The only transitions are `Idle -> Running` and `Running` to exactly one of
/// the three terminal states; a fresh run needs a fresh instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Receives the outcome of one background analysis.
///
/// Exactly one of the three callbacks fires, on the worker thread.
pub trait AnalysisListener: Send {
    /// The analysis completed; the result may be legitimately empty.
    fn on_done(&self, result: AnalysisResult);
    /// The analysis failed with an I/O-originated error.
    fn on_failed(&self, error: EphysError);
    /// The analysis was cancelled; no result is delivered.
    fn on_cancelled(&self);
}

/// Single-use background executor for one [`AnalysisRequest`].
#[derive(Derivative)]
#[derivative(Debug)]
pub struct AnalysisRunner {
    #[derivative(Debug = "ignore")]
    request: Option<AnalysisRequest>,
    token: CancelToken,
    state: Arc<Mutex<RunnerState>>,
    #[derivative(Debug = "ignore")]
    handle: Option<JoinHandle<()>>,
}

impl AnalysisRunner {
    /// Create an idle runner for the given request.
    pub fn new(request: AnalysisRequest) -> Self {
        AnalysisRunner {
            request: Some(request),
            token: CancelToken::new(),
            state: Arc::new(Mutex::new(RunnerState::Idle)),
            handle: None,
        }
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> RunnerState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Starts the analysis on a dedicated worker thread.
    ///
    /// Exactly one of the listener callbacks will fire. Returns an error if
    /// the runner was already started; instances are single-use.
    pub fn start<L: AnalysisListener + 'static>(&mut self, listener: L) -> Result<(), EphysError> {
        let request = self.request.take().ok_or_else(|| {
            EphysError::InvalidOperation("the runner has already been started".to_string())
        })?;

        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) =
            RunnerState::Running;

        let token = self.token.clone();
        let state = self.state.clone();
        self.handle = Some(thread::spawn(move || {
            let outcome = request.process(&token);
            let mut state = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            match outcome {
                // A cancellation racing the final unit of work still wins
                Ok(_) if token.is_cancelled() => {
                    debug!("Analysis cancelled after its last unit of work");
                    *state = RunnerState::Cancelled;
                    listener.on_cancelled();
                }
                Ok(result) => {
                    *state = RunnerState::Completed;
                    listener.on_done(result);
                }
                Err(EphysError::Cancelled) => {
                    *state = RunnerState::Cancelled;
                    listener.on_cancelled();
                }
                Err(error) => {
                    debug!("Analysis failed: {}", error);
                    *state = RunnerState::Failed;
                    listener.on_failed(error);
                }
            }
        }));
        Ok(())
    }

    /// Requests cooperative cancellation of the running analysis.
    ///
    /// Granularity is at least per train, pair or channel; a unit of work
    /// already in flight runs to its end before the request is observed.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Blocks until the worker thread has delivered its outcome.
    pub fn join(&mut self) -> Result<(), EphysError> {
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| EphysError::InvalidOperation("the worker panicked".to_string()))?;
        }
        Ok(())
    }
}

//! CPU time limited execution
//!
//! [`CpuTimeLimit::run`] starts the body on a fresh worker thread and polls
//! the worker's CPU time until it either finishes or exceeds the budget.
//! Every run gets its own budget, starting at the configured default. The
//! body changes it through [`CpuTimeLimit::set`] on any handle; the call
//! reaches the run whose worker is the calling thread, so concurrent runs
//! never see each other's budgets.
//! An overrunning worker is asked to stop through its cancellation token;
//! it is never killed.

use super::{format_seconds, CpuStopwatch, StopwatchMode};
use crate::config::TimeLimitConfig;
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError};
use edutest_core::callstack::{self, CallStack};
use edutest_core::cancel::{self, CancellationToken};
use edutest_core::StackFrame;
use std::cell::RefCell;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// How often the supervisor checks the worker's CPU time by default
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Name of the worker thread running the body
pub const WORKER_THREAD_NAME: &str = "edutest-time-limit";

/// Why a time-limited run produced no result
#[derive(Debug, Error)]
pub enum TimeLimitError {
    /// The body used more CPU time than allowed
    #[error("Time limit ({}s) exceeded", format_limit(.limit))]
    TimeLimitExceeded {
        /// Budget in effect when the run was stopped, in seconds
        limit: f64,
        /// Worker's call stack when it was stopped, innermost first
        stack: Vec<StackFrame>,
    },

    /// Thread CPU time cannot be measured on this platform
    #[error("thread CPU time measurement is not supported on this platform")]
    UnsupportedPlatform,

    /// The worker thread could not be started
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] io::Error),

    /// The worker disappeared without reporting a result
    #[error("worker thread exited without a result")]
    WorkerLost,

    /// The worker's CPU time could not be read
    #[error("failed to measure worker CPU time: {0}")]
    Measurement(#[source] io::Error),
}

thread_local! {
    static RUN_BUDGET: RefCell<Option<Budget>> = const { RefCell::new(None) };
}

/// Seconds of CPU time one run may use
#[derive(Debug, Clone)]
struct Budget(Arc<AtomicU64>);

impl Budget {
    fn new(seconds: f64) -> Self {
        Budget(Arc::new(AtomicU64::new(seconds.to_bits())))
    }

    fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    fn set(&self, seconds: f64) {
        self.0.store(seconds.to_bits(), Ordering::Release);
    }

    fn current() -> Option<Budget> {
        RUN_BUDGET.with(|cur| cur.borrow().clone())
    }

    fn install(self) -> BudgetGuard {
        let previous = RUN_BUDGET.with(|cur| cur.borrow_mut().replace(self));
        BudgetGuard { previous }
    }
}

/// Restores the enclosing run's budget when a worker finishes
struct BudgetGuard {
    previous: Option<Budget>,
}

impl Drop for BudgetGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        RUN_BUDGET.with(|cur| *cur.borrow_mut() = previous);
    }
}

fn format_limit(limit: &f64) -> String {
    format_seconds(*limit)
}

impl TimeLimitError {
    /// Whether the run was stopped for exceeding its budget
    pub fn is_timeout(&self) -> bool {
        matches!(self, TimeLimitError::TimeLimitExceeded { .. })
    }
}

#[derive(Debug, Clone)]
struct Settings {
    default_seconds: f64,
    mode: StopwatchMode,
    poll_interval: Duration,
    stack_size: Option<usize>,
}

/// Runs test bodies under a CPU time budget
///
/// The handle only carries settings. Budgets belong to runs, so one handle
/// can supervise several bodies at once.
#[derive(Debug, Clone)]
pub struct CpuTimeLimit {
    settings: Settings,
}

impl Default for CpuTimeLimit {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuTimeLimit {
    /// A limit with no default budget; the body has to call [`set`](Self::set)
    pub fn new() -> Self {
        Self::with_default(f64::INFINITY)
    }

    /// A limit whose budget starts at `seconds` in every run
    pub fn with_default(seconds: f64) -> Self {
        Self {
            settings: Settings {
                default_seconds: seconds,
                mode: StopwatchMode::default(),
                poll_interval: DEFAULT_POLL_INTERVAL,
                stack_size: None,
            },
        }
    }

    /// Build from configuration
    pub fn from_config(config: &TimeLimitConfig) -> Self {
        Self::with_default(config.default_seconds.unwrap_or(f64::INFINITY))
            .with_mode(config.mode)
            .with_poll_interval(Duration::from_millis(config.poll_interval_ms))
    }

    /// Count user, system or all CPU time
    pub fn with_mode(mut self, mode: StopwatchMode) -> Self {
        self.settings.mode = mode;
        self
    }

    /// How long the supervisor waits between checks
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.settings.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Stack size of the worker thread
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.settings.stack_size = Some(bytes);
        self
    }

    /// Counting mode
    pub fn mode(&self) -> StopwatchMode {
        self.settings.mode
    }

    /// Poll interval
    pub fn poll_interval(&self) -> Duration {
        self.settings.poll_interval
    }

    /// Budget every run starts with, in seconds
    pub fn default_limit(&self) -> f64 {
        self.settings.default_seconds
    }

    /// Change the budget of the run executing on the calling thread
    ///
    /// Returns `false` and changes nothing when called outside a body, or
    /// from a thread the body spawned itself.
    pub fn set(&self, seconds: f64) -> bool {
        match Budget::current() {
            Some(budget) => {
                budget.set(seconds);
                true
            }
            None => {
                log::debug!("time limit of {}s set outside a run, ignored", format_seconds(seconds));
                false
            }
        }
    }

    /// Budget of the run executing on the calling thread, or the default
    /// outside a run
    pub fn limit(&self) -> f64 {
        Budget::current().map_or(self.settings.default_seconds, |budget| budget.get())
    }

    /// Run `body` on a worker thread under the budget
    ///
    /// Returns the body's value if it finishes in time. A panic in the body
    /// is resumed on the calling thread. A result that arrives before the
    /// timeout is noticed always wins over the timeout.
    pub fn run<T, F>(&self, body: F) -> Result<T, TimeLimitError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if !CpuStopwatch::is_supported() {
            return Err(TimeLimitError::UnsupportedPlatform);
        }
        let budget = Budget::new(self.settings.default_seconds);
        let worker_budget = budget.clone();
        let token = CancellationToken::new();
        let worker_token = token.clone();
        let (ready_tx, ready_rx) = bounded::<(super::ThreadId, CallStack)>(1);
        let (done_tx, done_rx) = bounded::<thread::Result<T>>(1);

        let mut builder = thread::Builder::new().name(WORKER_THREAD_NAME.to_string());
        if let Some(size) = self.settings.stack_size {
            builder = builder.stack_size(size);
        }
        let handle = builder
            .spawn(move || {
                let _token = cancel::install(worker_token);
                let _budget = worker_budget.install();
                let _ = ready_tx.send((super::current_thread_id(), callstack::current()));
                let result = panic::catch_unwind(AssertUnwindSafe(body));
                let _ = done_tx.send(result);
            })
            .map_err(TimeLimitError::Spawn)?;

        let (tid, stack) = ready_rx.recv().map_err(|_| TimeLimitError::WorkerLost)?;
        let stopwatch = match CpuStopwatch::for_thread(tid, self.settings.mode) {
            Ok(stopwatch) => stopwatch,
            Err(e) => return self.finish_unmeasured(&done_rx, handle, e),
        };

        loop {
            match stopwatch.elapsed() {
                Ok(elapsed) if elapsed.as_secs_f64() >= budget.get() => break,
                Ok(_) => {}
                Err(e) => return self.finish_unmeasured(&done_rx, handle, e),
            }
            match done_rx.recv_timeout(self.settings.poll_interval) {
                Ok(result) => return finish(result, handle),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(TimeLimitError::WorkerLost),
            }
        }

        if let Ok(result) = done_rx.try_recv() {
            return finish(result, handle);
        }

        let limit = budget.get();
        let stack = stack.snapshot();
        token.cancel();
        log::info!(
            "time limit of {}s exceeded, cancelling worker{}",
            format_seconds(limit),
            stack
                .first()
                .map(|frame| format!(" in {}", frame))
                .unwrap_or_default()
        );
        Err(TimeLimitError::TimeLimitExceeded { limit, stack })
    }

    /// The worker's stat file vanishes when it exits, so a failed reading
    /// usually means the result is already on its way.
    fn finish_unmeasured<T>(
        &self,
        done_rx: &Receiver<thread::Result<T>>,
        handle: thread::JoinHandle<()>,
        error: io::Error,
    ) -> Result<T, TimeLimitError> {
        match done_rx.recv_timeout(self.settings.poll_interval) {
            Ok(result) => finish(result, handle),
            Err(RecvTimeoutError::Timeout) => Err(TimeLimitError::Measurement(error)),
            Err(RecvTimeoutError::Disconnected) => Err(TimeLimitError::WorkerLost),
        }
    }
}

fn finish<T>(result: thread::Result<T>, handle: thread::JoinHandle<()>) -> Result<T, TimeLimitError> {
    let _ = handle.join();
    match result {
        Ok(value) => Ok(value),
        Err(payload) => panic::resume_unwind(payload),
    }
}

//! Cooperative cancellation
//!
//! A thread may have a [`CancellationToken`] installed. The interpreter polls
//! it at backward jumps and calls; native code and test bodies can poll it
//! with [`checkpoint`], [`is_cancelled`] or [`sleep`].

use crate::fault::{kinds, Fault};
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create an untriggered token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

thread_local! {
    static CURRENT: RefCell<Option<CancellationToken>> = const { RefCell::new(None) };
}

/// Restores the previously installed token when dropped
pub struct TokenGuard {
    previous: Option<CancellationToken>,
}

impl Drop for TokenGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|cur| *cur.borrow_mut() = previous);
    }
}

/// Install `token` for the calling thread
pub fn install(token: CancellationToken) -> TokenGuard {
    let previous = CURRENT.with(|cur| cur.borrow_mut().replace(token));
    TokenGuard { previous }
}

/// Token installed on the calling thread
pub fn current() -> Option<CancellationToken> {
    CURRENT.with(|cur| cur.borrow().clone())
}

/// Whether the calling thread was asked to stop
pub fn is_cancelled() -> bool {
    CURRENT.with(|cur| cur.borrow().as_ref().is_some_and(|t| t.is_cancelled()))
}

/// Fail with an `InterruptedException` fault if the calling thread was asked to stop
pub fn checkpoint() -> Result<(), Fault> {
    if is_cancelled() {
        return Err(Fault::new(kinds::INTERRUPTED, None));
    }
    Ok(())
}

/// Sleep for `duration`, waking early with a fault on cancellation
pub fn sleep(duration: Duration) -> Result<(), Fault> {
    let deadline = Instant::now() + duration;
    loop {
        checkpoint()?;
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        std::thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}

//! CPU time measurement and time-limited execution
//!
//! [`CpuStopwatch`] measures the CPU time consumed by one thread.
//! [`CpuTimeLimit`] runs a test body on a worker thread and gives up on it
//! once the worker has used more CPU time than its budget allows.

mod limit;
mod stopwatch;

pub use limit::{CpuTimeLimit, TimeLimitError, DEFAULT_POLL_INTERVAL, WORKER_THREAD_NAME};
pub use stopwatch::{current_thread_id, CpuStopwatch, ThreadId};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which CPU time a stopwatch counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopwatchMode {
    /// Time spent in user mode
    #[default]
    User,
    /// Time spent in the kernel on behalf of the thread
    System,
    /// User and system time together
    Both,
}

impl fmt::Display for StopwatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopwatchMode::User => "user",
            StopwatchMode::System => "system",
            StopwatchMode::Both => "both",
        })
    }
}

/// Format seconds with at most three decimals and no trailing zeros
pub fn format_seconds(seconds: f64) -> String {
    if !seconds.is_finite() {
        return if seconds > 0.0 { "∞".to_string() } else { seconds.to_string() };
    }
    let text = format!("{:.3}", seconds);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    match text {
        "" | "-0" => "0".to_string(),
        other => other.to_string(),
    }
}

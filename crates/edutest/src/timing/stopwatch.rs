//! Per-thread CPU stopwatch
//!
//! Thread CPU times come from `/proc/self/task/<tid>/stat`, so measurement
//! is only available on Linux.

use super::StopwatchMode;
use std::fmt;
use std::io;
use std::time::Duration;

/// Kernel thread id
pub type ThreadId = i64;

/// Kernel id of the calling thread
#[cfg(target_os = "linux")]
pub fn current_thread_id() -> ThreadId {
    // SAFETY: gettid takes no arguments and cannot fail.
    unsafe { libc::syscall(libc::SYS_gettid) as ThreadId }
}

/// Kernel id of the calling thread
#[cfg(not(target_os = "linux"))]
pub fn current_thread_id() -> ThreadId {
    -1
}

fn clock_ticks_per_second() -> Option<u64> {
    // SAFETY: sysconf only reads a configuration value.
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    (ticks > 0).then_some(ticks as u64)
}

/// Parse `(utime, stime)` in clock ticks out of a `stat` line
///
/// The command name in field 2 may contain spaces and parentheses, so
/// fields are counted from the last `)`.
fn parse_stat(stat: &str) -> Option<(u64, u64)> {
    let rest = &stat[stat.rfind(')')? + 1..];
    let fields: Vec<&str> = rest.split_whitespace().collect();
    let utime = fields.get(11)?.parse().ok()?;
    let stime = fields.get(12)?.parse().ok()?;
    Some((utime, stime))
}

#[cfg(target_os = "linux")]
fn thread_times(tid: ThreadId) -> io::Result<(u64, u64)> {
    let stat = std::fs::read_to_string(format!("/proc/self/task/{}/stat", tid))?;
    parse_stat(&stat).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, format!("malformed stat for thread {}", tid))
    })
}

#[cfg(not(target_os = "linux"))]
fn thread_times(_tid: ThreadId) -> io::Result<(u64, u64)> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "thread CPU time measurement is not supported on this platform",
    ))
}

/// Measures the CPU time used by one thread since it was started
#[derive(Debug, Clone)]
pub struct CpuStopwatch {
    mode: StopwatchMode,
    tid: ThreadId,
    ticks_per_second: u64,
    start: u64,
}

impl CpuStopwatch {
    /// Whether thread CPU time can be measured here
    pub fn is_supported() -> bool {
        clock_ticks_per_second().is_some() && thread_times(current_thread_id()).is_ok()
    }

    /// Stopwatch for the calling thread
    pub fn start(mode: StopwatchMode) -> io::Result<Self> {
        Self::for_thread(current_thread_id(), mode)
    }

    /// Stopwatch for another thread of this process
    pub fn for_thread(tid: ThreadId, mode: StopwatchMode) -> io::Result<Self> {
        let ticks_per_second = clock_ticks_per_second().ok_or_else(|| {
            io::Error::new(io::ErrorKind::Unsupported, "clock tick rate unavailable")
        })?;
        let mut stopwatch = Self {
            mode,
            tid,
            ticks_per_second,
            start: 0,
        };
        stopwatch.start = stopwatch.ticks()?;
        Ok(stopwatch)
    }

    /// Counting mode
    pub fn mode(&self) -> StopwatchMode {
        self.mode
    }

    /// Measured thread
    pub fn thread_id(&self) -> ThreadId {
        self.tid
    }

    fn ticks(&self) -> io::Result<u64> {
        let (user, system) = thread_times(self.tid)?;
        Ok(match self.mode {
            StopwatchMode::User => user,
            StopwatchMode::System => system,
            StopwatchMode::Both => user + system,
        })
    }

    /// CPU time used since start or the last restart
    ///
    /// Fails once the measured thread has exited.
    pub fn elapsed(&self) -> io::Result<Duration> {
        let ticks = self.ticks()?.saturating_sub(self.start);
        let nanos = u128::from(ticks) * 1_000_000_000 / u128::from(self.ticks_per_second);
        Ok(Duration::from_nanos(nanos.min(u128::from(u64::MAX)) as u64))
    }

    /// Start counting from zero again
    pub fn restart(&mut self) -> io::Result<()> {
        self.start = self.ticks()?;
        Ok(())
    }
}

impl fmt::Display for CpuStopwatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.mode {
            StopwatchMode::User => "user ",
            StopwatchMode::System => "system ",
            StopwatchMode::Both => "",
        };
        match self.elapsed() {
            Ok(elapsed) => write!(f, "Elapsed {}CPU time: {}", label, elapsed.as_secs_f64()),
            Err(_) => write!(f, "Elapsed {}CPU time: unavailable", label),
        }
    }
}

//! Per-thread shadow call stack
//!
//! Every method executed by the runtime pushes a frame here. Faults snapshot
//! it as their stack trace, and a [`CallStack`] handle lets another thread
//! (the time-limit supervisor) read a worker's stack while it runs.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// One frame of a stack trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Qualified name of the class
    pub class: String,
    /// Method name
    pub method: String,
}

impl StackFrame {
    /// Create a frame
    pub fn new(class: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            method: method.into(),
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.method)
    }
}

/// Shared handle to one thread's frames
#[derive(Debug, Clone, Default)]
pub struct CallStack {
    frames: Arc<Mutex<Vec<StackFrame>>>,
}

impl CallStack {
    /// Frames, innermost first
    pub fn snapshot(&self) -> Vec<StackFrame> {
        self.frames.lock().iter().rev().cloned().collect()
    }

    /// Current depth
    pub fn depth(&self) -> usize {
        self.frames.lock().len()
    }
}

thread_local! {
    static CURRENT: CallStack = CallStack::default();
}

/// Handle to the calling thread's stack
pub fn current() -> CallStack {
    CURRENT.with(|stack| stack.clone())
}

/// Snapshot of the calling thread's stack, innermost first
pub fn snapshot() -> Vec<StackFrame> {
    CURRENT.with(|stack| stack.snapshot())
}

/// Depth of the calling thread's stack
pub fn depth() -> usize {
    CURRENT.with(|stack| stack.depth())
}

/// Pops its frame when dropped
#[must_use = "the frame is popped as soon as the guard is dropped"]
pub struct FrameGuard {
    stack: CallStack,
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        self.stack.frames.lock().pop();
    }
}

/// Push a frame on the calling thread's stack
pub fn enter(class: impl Into<String>, method: impl Into<String>) -> FrameGuard {
    let stack = current();
    stack.frames.lock().push(StackFrame::new(class, method));
    FrameGuard { stack }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_push_and_pop() {
        assert_eq!(depth(), 0);
        {
            let _outer = enter("a.A", "outer");
            let _inner = enter("a.B", "inner");
            assert_eq!(
                snapshot(),
                vec![StackFrame::new("a.B", "inner"), StackFrame::new("a.A", "outer")]
            );
        }
        assert_eq!(depth(), 0);
    }

    #[test]
    fn test_handle_observed_from_other_thread() {
        let (tx, rx) = std::sync::mpsc::channel();
        let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();
        let worker = std::thread::spawn(move || {
            let _frame = enter("w.Worker", "spin");
            tx.send(current()).unwrap();
            done_rx.recv().unwrap();
        });
        let handle = rx.recv().unwrap();
        assert_eq!(handle.snapshot()[0].to_string(), "w.Worker.spin");
        done_tx.send(()).unwrap();
        worker.join().unwrap();
        assert_eq!(handle.depth(), 0);
    }
}

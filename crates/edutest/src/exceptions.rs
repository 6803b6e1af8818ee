//! Rewriting fault messages
//!
//! An [`ExceptionMessageFilter`] holds an ordered list of functions that may
//! supply a replacement message for a fault. The first function returning
//! `Some` wins; if none does, the original message is kept. Causes are
//! filtered first, and the rebuilt fault keeps the original type and stack
//! trace.

use crate::reflect::ReflectError;
use edutest_core::Fault;
use std::fmt;

type MessageFunction = Box<dyn Fn(&Fault) -> Option<String> + Send + Sync>;

/// Rewrites fault messages through a list of functions
#[derive(Default)]
pub struct ExceptionMessageFilter {
    functions: Vec<MessageFunction>,
    chain_cause_messages: bool,
}

impl ExceptionMessageFilter {
    /// A filter without functions
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message function
    pub fn add_function(
        &mut self,
        function: impl Fn(&Fault) -> Option<String> + Send + Sync + 'static,
    ) {
        self.functions.push(Box::new(function));
    }

    /// Builder-style [`add_function`](Self::add_function)
    pub fn with_function(
        mut self,
        function: impl Fn(&Fault) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.add_function(function);
        self
    }

    /// Append the cause's message to each rewritten message (`"msg: cause msg"`)
    pub fn set_chaining_cause_messages(&mut self, enable: bool) {
        self.chain_cause_messages = enable;
    }

    /// Whether cause messages are appended
    pub fn is_chaining_cause_messages(&self) -> bool {
        self.chain_cause_messages
    }

    /// Number of message functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether there are no message functions
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn new_message_for(&self, fault: &Fault) -> Option<String> {
        self.functions
            .iter()
            .find_map(|function| function(fault))
            .or_else(|| fault.message().map(str::to_string))
    }

    /// Rebuild `fault` and its causes with filtered messages
    pub fn filter(&self, fault: &Fault) -> Fault {
        let cause = fault.cause().map(|cause| self.filter(cause));
        let mut message = self.new_message_for(fault);
        if self.chain_cause_messages {
            if let (Some(own), Some(cause_message)) =
                (&message, cause.as_ref().and_then(Fault::message))
            {
                message = Some(format!("{}: {}", own, cause_message));
            }
        }
        fault.rebuild(message, cause)
    }

    /// Filter the fault inside a reflective error; other errors pass through
    pub fn filter_error(&self, error: ReflectError) -> ReflectError {
        match error {
            ReflectError::Fault(fault) => ReflectError::Fault(self.filter(&fault)),
            other => other,
        }
    }

    /// Run `body`, filtering any fault it fails with
    pub fn run<T>(&self, body: impl FnOnce() -> Result<T, Fault>) -> Result<T, Fault> {
        body().map_err(|fault| self.filter(&fault))
    }
}

impl fmt::Debug for ExceptionMessageFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExceptionMessageFilter")
            .field("functions", &self.functions.len())
            .field("chain_cause_messages", &self.chain_cause_messages)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edutest_core::{callstack, kinds};

    fn replace_boom(fault: &Fault) -> Option<String> {
        (fault.message() == Some("boom")).then(|| "kaboom".to_string())
    }

    #[test]
    fn test_first_matching_function_wins() {
        let filter = ExceptionMessageFilter::new()
            .with_function(|_| None)
            .with_function(replace_boom)
            .with_function(|_| Some("never".to_string()));
        let fault = Fault::with_message(kinds::ILLEGAL_STATE, "boom");
        let filtered = filter.filter(&fault);
        assert_eq!(filtered.message(), Some("kaboom"));
        assert_eq!(filtered.type_name(), kinds::ILLEGAL_STATE);
        assert!(!Fault::ptr_eq(&filtered, &fault));
    }

    #[test]
    fn test_unmatched_message_kept() {
        let filter = ExceptionMessageFilter::new().with_function(replace_boom);
        let filtered = filter.filter(&Fault::with_message(kinds::ARITHMETIC, "/ by zero"));
        assert_eq!(filtered.message(), Some("/ by zero"));
        let bare = filter.filter(&Fault::new(kinds::ARITHMETIC, None));
        assert_eq!(bare.message(), None);
    }

    #[test]
    fn test_causes_filtered_and_chained() {
        let inner = Fault::with_message(kinds::ILLEGAL_ARGUMENT, "boom");
        let outer = Fault::caused_by(kinds::ILLEGAL_STATE, Some("outer".into()), inner);

        let mut filter = ExceptionMessageFilter::new().with_function(replace_boom);
        let plain = filter.filter(&outer);
        assert_eq!(plain.message(), Some("outer"));
        assert_eq!(plain.cause().unwrap().message(), Some("kaboom"));

        filter.set_chaining_cause_messages(true);
        let chained = filter.filter(&outer);
        assert_eq!(chained.message(), Some("outer: kaboom"));
        assert_eq!(chained.cause().unwrap().type_name(), kinds::ILLEGAL_ARGUMENT);
    }

    #[test]
    fn test_stack_preserved() {
        let fault = {
            let _frame = callstack::enter("demo.Calc", "div");
            Fault::with_message(kinds::ARITHMETIC, "boom")
        };
        let filter = ExceptionMessageFilter::new().with_function(replace_boom);
        let result: Result<(), Fault> = filter.run(|| Err(fault.clone()));
        let filtered = result.unwrap_err();
        assert_eq!(filtered.stack(), fault.stack());
        assert_eq!(filtered.message(), Some("kaboom"));
    }
}

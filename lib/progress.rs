//! Human-readable status lines.
//!
//! Nothing in the transformation depends on what a sink does with its lines.

use std::{ cell::RefCell, time::Instant };

/// Destination for status lines.
pub trait ProgressSink {
    fn print_line(&self, line: &str);
}

/// Forwards status lines to the [`log`] facade at info level.
#[derive(Copy, Clone, Debug, Default)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn print_line(&self, line: &str) { log::info!("{line}"); }
}

/// Discards all status lines.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn print_line(&self, _line: &str) { }
}

/// Keeps all status lines in memory.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    lines: RefCell<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self { Self::default() }

    /// Return a copy of all lines recorded so far.
    pub fn lines(&self) -> Vec<String> { self.lines.borrow().clone() }

    /// Return `true` if any recorded line contains `pat`.
    pub fn contains(&self, pat: &str) -> bool {
        self.lines.borrow().iter().any(|l| l.contains(pat))
    }
}

impl ProgressSink for MemorySink {
    fn print_line(&self, line: &str) {
        self.lines.borrow_mut().push(line.to_string());
    }
}

impl<S> ProgressSink for std::rc::Rc<S>
where S: ProgressSink + ?Sized
{
    fn print_line(&self, line: &str) { (**self).print_line(line); }
}

/// Prefixes status lines with a caller name and the time elapsed since
/// creation.
pub struct ProgressIndicator {
    caller: String,
    start: Instant,
    sink: Box<dyn ProgressSink>,
}

impl std::fmt::Debug for ProgressIndicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressIndicator")
            .field("caller", &self.caller)
            .field("start", &self.start)
            .finish_non_exhaustive()
    }
}

impl ProgressIndicator {
    pub fn new<S>(caller: &str, sink: S) -> Self
    where S: ProgressSink + 'static
    {
        Self { caller: caller.to_string(), start: Instant::now(), sink: Box::new(sink) }
    }

    pub fn print_line(&self, msg: &str) {
        let elapsed = self.start.elapsed().as_secs_f64();
        self.sink.print_line(&format!("{} [{elapsed:.3}]: {msg}", self.caller));
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;
    use super::*;

    #[test]
    fn indicator_prefixes_caller() {
        let sink = Rc::new(MemorySink::new());
        let progress = ProgressIndicator::new("Caller", Rc::clone(&sink));
        progress.print_line("hello");
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("Caller ["));
        assert!(lines[0].ends_with("]: hello"));
        assert!(sink.contains("hello"));
    }
}

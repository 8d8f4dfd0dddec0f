use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{Level, Log, Record};

/// Target attached to every verbose record
pub const VERBOSE_TARGET: &str = "envprep::verbose";

/// Pushed loggers, innermost last, each tagged with the id of its scope
#[derive(Default)]
struct LoggerStack {
    entries: Vec<(u64, Arc<dyn Log>)>,
    next_id: u64,
}

/// Handle to a stack of verbose loggers.
///
/// Components that want to report detail (providers, the preparation
/// pipeline, teardown) receive a clone of this handle instead of reaching
/// for a global. The innermost pushed logger receives the output; with
/// nothing pushed, verbose output is discarded.
#[derive(Clone, Default)]
pub struct VerboseLogger {
    stack: Arc<Mutex<LoggerStack>>,
}

impl fmt::Debug for VerboseLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerboseLogger")
            .field("depth", &self.depth())
            .finish()
    }
}

impl VerboseLogger {
    /// Create a handle with an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LoggerStack> {
        lock_stack(&self.stack)
    }

    /// Push a logger; it stays active until the returned scope is dropped
    pub fn push(&self, logger: Arc<dyn Log>) -> VerboseScope {
        let mut stack = self.lock();
        let id = stack.next_id;
        stack.next_id += 1;
        stack.entries.push((id, logger));
        VerboseScope {
            stack: Arc::clone(&self.stack),
            id,
            depth: stack.entries.len(),
        }
    }

    /// Number of loggers currently pushed
    pub fn depth(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether any logger is pushed
    pub fn is_active(&self) -> bool {
        self.depth() > 0
    }

    /// The innermost logger, if any
    pub fn current(&self) -> Option<Arc<dyn Log>> {
        self.lock().entries.last().map(|(_, logger)| Arc::clone(logger))
    }

    /// Emit a record to the innermost logger
    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        // Release the stack before calling out, the logger may push its own scope
        let Some(logger) = self.current() else {
            return;
        };
        let record = Record::builder()
            .args(args)
            .level(level)
            .target(VERBOSE_TARGET)
            .build();
        if logger.enabled(record.metadata()) {
            logger.log(&record);
        }
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::Debug, format_args!("{}", message));
    }

    pub fn info(&self, message: &str) {
        self.log(Level::Info, format_args!("{}", message));
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::Warn, format_args!("{}", message));
    }
}

/// Keeps a pushed logger active; pops it when dropped.
///
/// Dropping an outer scope first also pops everything pushed after it. A
/// scope whose logger was already popped that way does nothing when dropped.
#[must_use = "dropping the scope immediately pops the logger"]
pub struct VerboseScope {
    stack: Arc<Mutex<LoggerStack>>,
    id: u64,
    depth: usize,
}

impl Drop for VerboseScope {
    fn drop(&mut self) {
        let mut stack = lock_stack(&self.stack);
        let position = self.depth.saturating_sub(1);
        let still_pushed = stack
            .entries
            .get(position)
            .is_some_and(|(id, _)| *id == self.id);
        if still_pushed {
            stack.entries.truncate(position);
        }
    }
}

fn lock_stack(stack: &Mutex<LoggerStack>) -> MutexGuard<'_, LoggerStack> {
    stack.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

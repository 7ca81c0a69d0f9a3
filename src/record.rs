//! Log record structure
//!
//! Defines the core LogRecord type that flows through the pipeline, the
//! optional identity fields the emission path captures on demand, and the
//! collection requirements that decide which of them get captured at all.

use crate::level::{Level, LevelRegistry, LevelSpec};
use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::BitOr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Source location supplied by the producer.
///
/// The engine never walks stacks; whatever the producer hands over is all
/// the caller information a record will carry.
#[derive(Debug, Clone, Default)]
pub struct Caller {
    /// Module name where the log originated
    pub name: Option<String>,
    /// Function name where the log originated
    pub function: Option<String>,
    /// Line number in source file
    pub line: Option<u32>,
    /// Source file name
    pub file: Option<String>,
}

/// Producer thread identity.
#[derive(Debug, Clone)]
pub struct ThreadIdent {
    pub name: Option<String>,
    pub id: u64,
}

/// Process identity, captured once per process.
#[derive(Debug, Clone)]
pub struct ProcessIdent {
    pub name: String,
    pub id: u32,
}

/// Which optional record fields a handler will consult.
///
/// Derived from a handler's format plan, forced to all-true by an opaque
/// filter, and overridable per handler. The engine-wide value is the OR
/// across all live handlers and callbacks; it governs whether the emission
/// path bothers to populate those fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionRequirements {
    pub caller: bool,
    pub thread: bool,
    pub process: bool,
    pub elapsed: bool,
}

impl CollectionRequirements {
    pub const NONE: Self = Self {
        caller: false,
        thread: false,
        process: false,
        elapsed: false,
    };

    pub const ALL: Self = Self {
        caller: true,
        thread: true,
        process: true,
        elapsed: true,
    };
}

impl BitOr for CollectionRequirements {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            caller: self.caller || rhs.caller,
            thread: self.thread || rhs.thread,
            process: self.process || rhs.process,
            elapsed: self.elapsed || rhs.elapsed,
        }
    }
}

/// Optional per-emission fields the producer may supply.
///
/// One emission entry point takes this struct; the level wrappers pass the
/// default (empty) value.
#[derive(Debug, Clone, Default)]
pub struct RecordFields {
    pub caller: Option<Caller>,
    /// Pre-rendered traceback text
    pub exception: Option<String>,
    pub extra: BTreeMap<String, Value>,
}

impl RecordFields {
    pub fn with_caller(mut self, caller: Caller) -> Self {
        self.caller = Some(caller);
        self
    }

    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// A single log record containing all information about a log entry.
///
/// Records are created by the emission path and passed read-only through
/// filters, formatters, and callbacks before being written to sinks.
/// Fields the aggregated collection requirements do not demand stay absent.
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// Resolved level (severity, display name, style)
    pub level: Arc<LevelSpec>,
    /// Final, already interpolated message text
    pub message: String,
    /// Wall-clock time at emission, millisecond precision
    pub timestamp: DateTime<Local>,
    /// Monotonic duration since engine initialization
    pub elapsed: Option<Duration>,
    /// Source location
    pub caller: Option<Caller>,
    /// Producer thread identity
    pub thread: Option<ThreadIdent>,
    /// Process identity
    pub process: Option<ProcessIdent>,
    /// Pre-rendered traceback text
    pub exception: Option<String>,
    /// User-supplied context fields (ordered so serialized output is stable)
    pub extra: BTreeMap<String, Value>,
}

impl LogRecord {
    /// Creates a record for a built-in level with the current timestamp and
    /// no optional fields. Mostly useful for filters and tests; the engine
    /// builds records through the emission path.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        static BUILTIN: Lazy<LevelRegistry> = Lazy::new(LevelRegistry::new);
        Self {
            level: BUILTIN.spec_of(level),
            message: message.into(),
            timestamp: Local::now(),
            elapsed: None,
            caller: None,
            thread: None,
            process: None,
            exception: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn level_no(&self) -> u16 {
        self.level.no
    }

    pub fn level_name(&self) -> &str {
        &self.level.name
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn with_caller(mut self, caller: Caller) -> Self {
        self.caller = Some(caller);
        self
    }
}

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ID: u64 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
}

/// Identity of the calling thread. Ids are assigned per thread on first use
/// and are stable for the thread's lifetime.
pub(crate) fn current_thread() -> ThreadIdent {
    ThreadIdent {
        name: std::thread::current().name().map(str::to_owned),
        id: THREAD_ID.with(|id| *id),
    }
}

static PROCESS: Lazy<ProcessIdent> = Lazy::new(|| ProcessIdent {
    name: std::env::current_exe()
        .ok()
        .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "unknown".to_string()),
    id: std::process::id(),
});

pub(crate) fn current_process() -> ProcessIdent {
    PROCESS.clone()
}

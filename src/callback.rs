//! Callback system for log events
//!
//! Record callbacks observe every admitted record read-only; error
//! callbacks observe internal failures together with a captured backtrace.
//! Callbacks are user code: failures and panics are caught at the boundary,
//! reported once, and never reach the producer.

use crate::level::Level;
use crate::record::LogRecord;
use crate::report::{self, ReportOnce};
use parking_lot::RwLock;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

/// Callback executed for each admitted log record.
/// Returns Ok(()) on success or Err(String) with an error message.
pub type RecordCallback = Arc<dyn Fn(&LogRecord) -> Result<(), String> + Send + Sync>;

/// Callback invoked on internal failures with the error message and a
/// captured backtrace.
pub type ErrorCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Manages record and error callbacks for the engine.
pub struct CallbackManager {
    record_callbacks: RwLock<Vec<(u16, RecordCallback)>>,
    error_callbacks: RwLock<Vec<ErrorCallback>>,
    /// Lowest level any record callback accepts; u16::MAX when none are
    /// registered. Read on the admission fast path.
    min_level: AtomicU16,
    fault: ReportOnce,
}

impl CallbackManager {
    pub fn new() -> Self {
        Self {
            record_callbacks: RwLock::new(Vec::new()),
            error_callbacks: RwLock::new(Vec::new()),
            min_level: AtomicU16::new(u16::MAX),
            fault: ReportOnce::new(),
        }
    }

    /// Registers a record callback gated at `level`.
    pub fn add_record_callback(&self, level: Level, callback: RecordCallback) {
        let mut callbacks = self.record_callbacks.write();
        callbacks.push((level.no(), callback));
        let min = callbacks.iter().map(|(no, _)| *no).min().unwrap_or(u16::MAX);
        self.min_level.store(min, Ordering::Relaxed);
    }

    pub fn add_error_callback(&self, callback: ErrorCallback) {
        self.error_callbacks.write().push(callback);
    }

    /// Lowest level any record callback accepts.
    pub(crate) fn min_level(&self) -> u16 {
        self.min_level.load(Ordering::Relaxed)
    }

    pub(crate) fn has_record_callbacks(&self) -> bool {
        self.min_level() != u16::MAX
    }

    /// Invokes every record callback whose level admits the record.
    /// Failures are reported once through the fallback.
    pub(crate) fn notify(&self, record: &LogRecord) {
        let callbacks = self.record_callbacks.read();
        for (min_no, callback) in callbacks.iter() {
            if record.level_no() < *min_no {
                continue;
            }
            let outcome = catch_unwind(AssertUnwindSafe(|| callback(record)));
            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(message)) => Some(message),
                Err(_) => Some("callback panicked".to_string()),
            };
            if let Some(message) = failure {
                self.fault.report("record callback", &message);
            }
        }
    }

    /// Reports an internal failure to every error callback, with a captured
    /// backtrace.
    pub(crate) fn notify_error(&self, message: &str) {
        let callbacks = self.error_callbacks.read();
        if callbacks.is_empty() {
            return;
        }
        let backtrace = format!("{:?}", backtrace::Backtrace::new());
        for callback in callbacks.iter() {
            if catch_unwind(AssertUnwindSafe(|| callback(message, &backtrace))).is_err() {
                report::report_error("error callback", &"callback panicked");
            }
        }
    }

    pub fn clear(&self) {
        self.record_callbacks.write().clear();
        self.error_callbacks.write().clear();
        self.min_level.store(u16::MAX, Ordering::Relaxed);
    }
}

impl Default for CallbackManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_record_callback_level_gate() {
        let manager = CallbackManager::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        manager.add_record_callback(
            Level::Warning,
            Arc::new(move |record| {
                seen_clone.lock().push(record.message.clone());
                Ok(())
            }),
        );

        manager.notify(&LogRecord::new(Level::Info, "quiet"));
        manager.notify(&LogRecord::new(Level::Error, "loud"));

        assert_eq!(seen.lock().as_slice(), ["loud"]);
    }

    #[test]
    fn test_min_level_tracks_callbacks() {
        let manager = CallbackManager::new();
        assert_eq!(manager.min_level(), u16::MAX);
        manager.add_record_callback(Level::Error, Arc::new(|_| Ok(())));
        assert_eq!(manager.min_level(), 40);
        manager.add_record_callback(Level::Debug, Arc::new(|_| Ok(())));
        assert_eq!(manager.min_level(), 10);
        manager.clear();
        assert_eq!(manager.min_level(), u16::MAX);
    }

    #[test]
    fn test_panicking_callback_is_contained() {
        let manager = CallbackManager::new();
        manager.add_record_callback(Level::Trace, Arc::new(|_| panic!("bad callback")));
        // Must not unwind into the caller.
        manager.notify(&LogRecord::new(Level::Info, "x"));
    }
}

//! Log record filtering
//!
//! A filter is an opaque predicate over a record, attached per handler.
//! Predicates are user code: panics are caught at the boundary and treated
//! as a rejection, so a misbehaving filter can never break the producer.

use crate::level::Level;
use crate::record::LogRecord;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

type Predicate = Arc<dyn Fn(&LogRecord) -> bool + Send + Sync>;

/// Predicate filter for log records.
///
/// A record passes a handler iff its severity clears the handler's level
/// and the filter (when present) returns true.
#[derive(Clone)]
pub struct Filter {
    predicate: Predicate,
}

impl Filter {
    pub fn new(predicate: impl Fn(&LogRecord) -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicate: Arc::new(predicate),
        }
    }

    /// Passes records at or above the given level.
    pub fn min_level(level: Level) -> Self {
        Self::new(move |record| record.level_no() >= level.no())
    }

    /// Passes records whose caller module equals `name` exactly.
    pub fn module_equals(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(move |record| {
            record
                .caller
                .as_ref()
                .and_then(|c| c.name.as_deref())
                .is_some_and(|m| m == name)
        })
    }

    /// Passes records whose caller function equals `name` exactly.
    pub fn function_equals(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(move |record| {
            record
                .caller
                .as_ref()
                .and_then(|c| c.function.as_deref())
                .is_some_and(|f| f == name)
        })
    }

    /// Evaluates the predicate, containing panics. `Err` means the predicate
    /// panicked; the caller reports it and treats the record as rejected.
    pub(crate) fn evaluate(&self, record: &LogRecord) -> Result<bool, String> {
        catch_unwind(AssertUnwindSafe(|| (self.predicate)(record))).map_err(|payload| {
            payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "filter panicked".to_string())
        })
    }
}

impl std::fmt::Debug for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Filter")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Caller;

    #[test]
    fn test_min_level_filter() {
        let filter = Filter::min_level(Level::Warning);
        assert!(!filter.evaluate(&LogRecord::new(Level::Info, "x")).unwrap());
        assert!(filter.evaluate(&LogRecord::new(Level::Error, "x")).unwrap());
    }

    #[test]
    fn test_module_filter() {
        let filter = Filter::module_equals("app.db");
        let record = LogRecord::new(Level::Info, "x").with_caller(Caller {
            name: Some("app.db".to_string()),
            ..Default::default()
        });
        assert!(filter.evaluate(&record).unwrap());
        assert!(!filter.evaluate(&LogRecord::new(Level::Info, "x")).unwrap());
    }

    #[test]
    fn test_panicking_filter_is_contained() {
        let filter = Filter::new(|_| panic!("boom"));
        let result = filter.evaluate(&LogRecord::new(Level::Info, "x"));
        assert_eq!(result.unwrap_err(), "boom");
    }
}

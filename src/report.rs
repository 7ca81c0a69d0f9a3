//! Internal fallback reporting
//!
//! Failures inside sinks, filters, and background tasks never reach the
//! producer; they land here instead. Reports go to stderr, and callers that
//! need once-only semantics gate through [`ReportOnce`].

use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};

pub(crate) fn report_error(context: &str, error: &dyn Display) {
    eprintln!("[LOGMILL ERROR] {}: {}", context, error);
}

/// Sticky one-shot reporter. The first call reports; later calls are silent.
#[derive(Debug, Default)]
pub(crate) struct ReportOnce {
    fired: AtomicBool,
}

impl ReportOnce {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns true if this call was the one that reported.
    pub(crate) fn report(&self, context: &str, error: &dyn Display) -> bool {
        if self.fired.swap(true, Ordering::Relaxed) {
            return false;
        }
        report_error(context, error);
        true
    }

    pub(crate) fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_once_fires_once() {
        let once = ReportOnce::new();
        assert!(once.report("ctx", &"first"));
        assert!(!once.report("ctx", &"second"));
        assert!(once.has_fired());
    }
}

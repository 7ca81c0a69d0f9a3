//! The logging engine
//!
//! Provides the primary Logger struct: handler management, the emission hot
//! path, context binding, callbacks, and lifecycle (`complete`/`shutdown`).
//! A process-wide engine is available through [`global`].
//!
//! The hot path takes no locks: admission reads the registry snapshot and
//! the callback threshold with atomic loads, and a record that clears
//! neither returns before any allocation happens.

use crate::callback::{CallbackManager, ErrorCallback, RecordCallback};
use crate::error::{LogmillError, Result};
use crate::handler::{Handler, HandlerConfig, SinkTarget};
use crate::level::{Level, LevelRegistry, LevelSpec};
use crate::record::{
    self, CollectionRequirements, LogRecord, RecordFields,
};
use crate::registry::HandlerRegistry;
use crate::report;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::path::absolute;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

thread_local! {
    static CONTEXT: RefCell<Vec<BTreeMap<String, Value>>> = const { RefCell::new(Vec::new()) };
}

/// RAII guard returned by [`Logger::contextualize`]. Pops the pushed extras
/// map off the thread-local stack on drop.
pub struct ContextGuard {
    // Thread-local context: the guard must be dropped on the pushing thread.
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CONTEXT.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// The logging engine: a handler registry, a level registry, callbacks, and
/// the emission path connecting them.
pub struct Logger {
    levels: LevelRegistry,
    registry: HandlerRegistry,
    callbacks: CallbackManager,
    bound: RwLock<BTreeMap<String, Value>>,
    start: Instant,
    enabled: AtomicBool,
}

impl Logger {
    pub fn new() -> Self {
        Self {
            levels: LevelRegistry::new(),
            registry: HandlerRegistry::new(),
            callbacks: CallbackManager::new(),
            bound: RwLock::new(BTreeMap::new()),
            start: Instant::now(),
            enabled: AtomicBool::new(true),
        }
    }

    // ----- handler management -----

    /// Adds a handler. All validation happens here; a registered handler
    /// never fails later for configuration reasons.
    pub fn add(&self, config: HandlerConfig) -> Result<u64> {
        if let SinkTarget::Path(path) = &config.sink {
            let resolved = absolute(path).unwrap_or_else(|_| path.clone());
            let taken = self.registry.snapshot().handlers.iter().any(|h| {
                h.file_path()
                    .map(|p| absolute(p).unwrap_or_else(|_| p.to_path_buf()) == resolved)
                    .unwrap_or(false)
            });
            if taken {
                return Err(LogmillError::InvalidConfig(format!(
                    "a handler already writes to {}",
                    resolved.display()
                )));
            }
        }
        let handler = Handler::build(self.registry.next_id(), config, &self.levels)?;
        Ok(self.registry.insert(handler))
    }

    /// Removes a handler, draining its worker first when enqueued.
    /// Subsequent writes to the removed handler are discarded with it.
    pub fn remove(&self, id: u64) -> bool {
        match self.registry.remove(id) {
            Some(handler) => {
                handler.shutdown();
                true
            }
            None => false,
        }
    }

    pub fn remove_all(&self) -> usize {
        let removed = self.registry.remove_all();
        for handler in &removed {
            handler.shutdown();
        }
        removed.len()
    }

    pub fn handler_count(&self) -> usize {
        self.registry.handler_count()
    }

    /// Minimum level across live handlers; `u16::MAX` with no handlers.
    pub fn min_level(&self) -> u16 {
        self.registry.min_level()
    }

    /// Aggregated collection requirements across handlers and callbacks.
    pub fn requirements(&self) -> CollectionRequirements {
        let mut requirements = self.registry.requirements();
        if self.callbacks.has_record_callbacks() {
            // Callbacks see the whole record; they are as opaque as filters.
            requirements = CollectionRequirements::ALL;
        }
        requirements
    }

    /// Records dropped by enqueued sinks (full channels, quarantines,
    /// shutdown timeouts).
    pub fn dropped(&self) -> u64 {
        self.registry
            .snapshot()
            .handlers
            .iter()
            .map(|h| h.dropped())
            .sum()
    }

    // ----- level registry -----

    /// Registers a custom level; see [`LevelRegistry::register`].
    pub fn register_level(
        &self,
        name: &str,
        no: u16,
        style: Option<&str>,
        icon: Option<&str>,
    ) -> Result<()> {
        self.levels.register(name, no, style, icon).map(|_| ())
    }

    pub fn level_by_name(&self, name: &str) -> Option<Arc<LevelSpec>> {
        self.levels.by_name(name)
    }

    // ----- context -----

    /// Binds a field merged into every subsequent record's extras.
    pub fn bind(&self, key: impl Into<String>, value: Value) {
        self.bound.write().insert(key.into(), value);
    }

    pub fn unbind(&self, key: &str) -> Option<Value> {
        self.bound.write().remove(key)
    }

    pub fn clear_bindings(&self) {
        self.bound.write().clear();
    }

    /// Pushes extras onto the calling thread's context stack; they merge
    /// into records emitted from this thread until the guard drops.
    #[must_use = "the context lasts only while the guard is alive"]
    pub fn contextualize(
        &self,
        extras: impl IntoIterator<Item = (String, Value)>,
    ) -> ContextGuard {
        let map: BTreeMap<String, Value> = extras.into_iter().collect();
        CONTEXT.with(|stack| stack.borrow_mut().push(map));
        ContextGuard {
            _not_send: PhantomData,
        }
    }

    // ----- callbacks -----

    pub fn add_record_callback(&self, level: Level, callback: RecordCallback) {
        self.callbacks.add_record_callback(level, callback);
    }

    pub fn add_error_callback(&self, callback: ErrorCallback) {
        self.callbacks.add_error_callback(callback);
    }

    pub fn clear_callbacks(&self) {
        self.callbacks.clear();
    }

    // ----- emission -----

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    /// Emits at a built-in level.
    pub fn log(&self, level: Level, message: impl Into<String>) {
        self.emit(self.levels.spec_of(level), message.into(), RecordFields::default());
    }

    /// Emits at a built-in level with producer-supplied fields.
    pub fn log_with(&self, level: Level, message: impl Into<String>, fields: RecordFields) {
        self.emit(self.levels.spec_of(level), message.into(), fields);
    }

    /// Emits at a registered level by name.
    pub fn log_named(&self, name: &str, message: impl Into<String>) -> Result<()> {
        let spec = self
            .levels
            .by_name(name)
            .ok_or_else(|| LogmillError::InvalidLevel(name.to_string()))?;
        self.emit(spec, message.into(), RecordFields::default());
        Ok(())
    }

    /// The emission entry point all wrappers route through.
    ///
    /// Admission short-circuits on the cached minimum level before any
    /// allocation. Optional record fields are captured only when the
    /// aggregated requirements demand them; a supplied caller is discarded
    /// when nothing would read it.
    pub fn emit(&self, level: Arc<LevelSpec>, message: String, fields: RecordFields) {
        if !self.enabled.load(Ordering::Relaxed) {
            return;
        }
        let state = self.registry.snapshot();
        let admit = state.min_level.min(self.callbacks.min_level());
        if level.no < admit {
            return;
        }

        let requirements = if self.callbacks.has_record_callbacks() {
            CollectionRequirements::ALL
        } else {
            state.requirements
        };

        let mut extra = self.bound.read().clone();
        CONTEXT.with(|stack| {
            for map in stack.borrow().iter() {
                extra.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        });
        extra.extend(fields.extra);

        let record = LogRecord {
            level,
            message,
            timestamp: chrono::Local::now(),
            elapsed: requirements.elapsed.then(|| self.start.elapsed()),
            caller: if requirements.caller { fields.caller } else { None },
            thread: requirements.thread.then(record::current_thread),
            process: requirements.process.then(record::current_process),
            exception: fields.exception,
            extra,
        };

        for handler in &state.handlers {
            if let Err(fault) = handler.handle(&record) {
                let message = fault.to_string();
                if handler.fault.report("handler", &message) {
                    self.callbacks.notify_error(&message);
                }
            }
        }

        self.callbacks.notify(&record);
    }

    // ----- level wrappers -----

    pub fn trace(&self, message: impl Into<String>) {
        self.log(Level::Trace, message);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(Level::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(Level::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.log(Level::Success, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(Level::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(Level::Error, message);
    }

    pub fn fail(&self, message: impl Into<String>) {
        self.log(Level::Fail, message);
    }

    pub fn critical(&self, message: impl Into<String>) {
        self.log(Level::Critical, message);
    }

    // ----- lifecycle -----

    /// Flushes every sync sink and waits for every enqueued sink to drain.
    pub fn complete(&self) {
        for handler in &self.registry.snapshot().handlers {
            if let Err(e) = handler.flush() {
                report::report_error("flush", &e);
            }
        }
    }

    /// Drains and stops every handler. The engine stays usable; new
    /// handlers can be added afterwards.
    pub fn shutdown(&self) {
        self.complete();
        self.remove_all();
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: Lazy<Logger> = Lazy::new(Logger::new);

/// The process-wide engine. Created on first use; call
/// [`Logger::shutdown`] on it before process exit to drain enqueued sinks.
pub fn global() -> &'static Logger {
    &GLOBAL
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::LevelThreshold;
    use parking_lot::Mutex;
    use serde_json::json;

    fn collecting_handler(logger: &Logger, level: Level) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        logger
            .add(HandlerConfig {
                sink: SinkTarget::Callable(Arc::new(move |text: &str| {
                    seen_clone.lock().push(text.to_string());
                    Ok(())
                })),
                level: LevelThreshold::Level(level),
                format: Some("{level} | {message}".to_string()),
                ..Default::default()
            })
            .unwrap();
        seen
    }

    #[test]
    fn test_level_admission() {
        let logger = Logger::new();
        let seen = collecting_handler(&logger, Level::Warning);

        logger.debug("no");
        logger.info("no");
        logger.warning("yes");
        logger.error("also yes");

        assert_eq!(
            seen.lock().as_slice(),
            ["WARNING | yes", "ERROR | also yes"]
        );
    }

    #[test]
    fn test_disable_suppresses_everything() {
        let logger = Logger::new();
        let seen = collecting_handler(&logger, Level::Trace);

        logger.disable();
        logger.critical("swallowed");
        logger.enable();
        logger.critical("heard");

        assert_eq!(seen.lock().as_slice(), ["CRITICAL | heard"]);
    }

    #[test]
    fn test_bound_fields_merge_into_extra() {
        let logger = Logger::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        logger
            .add(HandlerConfig {
                sink: SinkTarget::Callable(Arc::new(move |text: &str| {
                    seen_clone.lock().push(text.to_string());
                    Ok(())
                })),
                format: Some("{message} {extra[request]}".to_string()),
                ..Default::default()
            })
            .unwrap();

        logger.bind("request", json!("r-1"));
        logger.info("handling");
        logger.unbind("request");
        logger.info("done");

        assert_eq!(seen.lock().as_slice(), ["handling r-1", "done "]);
    }

    #[test]
    fn test_contextualize_scopes_extras() {
        let logger = Logger::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        logger
            .add(HandlerConfig {
                sink: SinkTarget::Callable(Arc::new(move |text: &str| {
                    seen_clone.lock().push(text.to_string());
                    Ok(())
                })),
                format: Some("{message}|{extra[job]}".to_string()),
                ..Default::default()
            })
            .unwrap();

        {
            let _guard = logger.contextualize([("job".to_string(), json!("batch-7"))]);
            logger.info("inside");
        }
        logger.info("outside");

        assert_eq!(seen.lock().as_slice(), ["inside|batch-7", "outside|"]);
    }

    #[test]
    fn test_call_site_extra_wins_over_bound() {
        let logger = Logger::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        logger
            .add(HandlerConfig {
                sink: SinkTarget::Callable(Arc::new(move |text: &str| {
                    seen_clone.lock().push(text.to_string());
                    Ok(())
                })),
                format: Some("{extra[k]}".to_string()),
                ..Default::default()
            })
            .unwrap();

        logger.bind("k", json!("bound"));
        logger.log_with(
            Level::Info,
            "m",
            RecordFields::default().with_field("k", json!("call-site")),
        );

        assert_eq!(seen.lock().as_slice(), ["call-site"]);
    }

    #[test]
    fn test_failing_sink_does_not_break_later_handlers() {
        let logger = Logger::new();
        logger
            .add(HandlerConfig {
                sink: SinkTarget::Callable(Arc::new(|_| Err("always broken".to_string()))),
                format: Some("{message}".to_string()),
                ..Default::default()
            })
            .unwrap();
        let seen = collecting_handler(&logger, Level::Trace);

        logger.info("one");
        logger.info("two");

        assert_eq!(seen.lock().as_slice(), ["INFO | one", "INFO | two"]);
    }

    #[test]
    fn test_duplicate_path_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let logger = Logger::new();
        logger
            .add(HandlerConfig {
                sink: SinkTarget::Path(path.clone()),
                ..Default::default()
            })
            .unwrap();

        let second = logger.add(HandlerConfig {
            sink: SinkTarget::Path(path),
            ..Default::default()
        });
        assert!(matches!(second, Err(LogmillError::InvalidConfig(_))));
    }

    #[test]
    fn test_custom_level_round_trip() {
        let logger = Logger::new();
        let seen = collecting_handler(&logger, Level::Trace);

        logger.register_level("NOTICE", 35, Some("blue"), None).unwrap();
        logger.log_named("notice", "attention").unwrap();
        assert!(logger.log_named("missing", "x").is_err());

        assert_eq!(seen.lock().as_slice(), ["NOTICE | attention"]);
    }

    #[test]
    fn test_caller_elided_when_not_required() {
        let logger = Logger::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        logger
            .add(HandlerConfig {
                sink: SinkTarget::Callable(Arc::new(move |text: &str| {
                    seen_clone.lock().push(text.to_string());
                    Ok(())
                })),
                serialize: true,
                collect: Some(CollectionRequirements::NONE),
                ..Default::default()
            })
            .unwrap();

        logger.log_with(
            Level::Info,
            "m",
            RecordFields::default().with_caller(crate::record::Caller {
                name: Some("app".to_string()),
                function: Some("f".to_string()),
                line: Some(1),
                file: Some("a.rs".to_string()),
            }),
        );

        let lines = seen.lock();
        let value: Value = serde_json::from_str(&lines[0]).unwrap();
        assert!(value["name"].is_null());
        assert!(value["line"].is_null());
    }
}

//! # logmill
//!
//! High-throughput structured logging engine. Records flow from producers
//! through a fast admission check into an ordered set of handlers, each
//! with its own level, filter, format plan, and sink:
//!
//! - **Console sinks** write to stdout/stderr with optional ANSI color
//!   resolved from inline `<red>...</red>` markup.
//! - **File sinks** combine a buffered writer with size- or time-based
//!   rotation, count- or age-based retention, optional gzip compression of
//!   rotated segments, and an optional enqueued mode where a background
//!   worker does all I/O.
//! - **Callable sinks** hand the rendered string to user code.
//!
//! Handlers can be added and removed while emissions are in flight; the
//! hot path reads an immutable snapshot and takes no locks. Fields a
//! record does not need (caller, thread, process, elapsed) are never
//! captured.
//!
//! ```no_run
//! use logmill::prelude::*;
//!
//! let logger = Logger::new();
//! logger.add(HandlerConfig {
//!     sink: SinkTarget::Path("logs/app.log".into()),
//!     level: Level::Info.into(),
//!     rotation: Some("10 MB".to_string()),
//!     retention: Some("7 days".to_string()),
//!     compression: true,
//!     enqueue: true,
//!     ..Default::default()
//! }).unwrap();
//!
//! logger.info("engine started");
//! logger.complete();
//! ```

pub mod callback;
pub mod colorize;
pub mod config_file;
pub mod error;
pub mod file;
pub mod filter;
pub mod format;
pub mod handler;
pub mod level;
pub mod logger;
pub mod record;
mod registry;
mod report;
pub mod rotation;
pub mod sink;
mod worker;

pub use error::{LogmillError, Result};
pub use logger::{ContextGuard, Logger, global};

pub mod prelude {
    pub use crate::callback::{ErrorCallback, RecordCallback};
    pub use crate::error::{LogmillError, Result};
    pub use crate::filter::Filter;
    pub use crate::format::Template;
    pub use crate::handler::{Handler, HandlerConfig, LevelThreshold, SinkTarget};
    pub use crate::level::{Level, LevelSpec};
    pub use crate::logger::{ContextGuard, Logger, global};
    pub use crate::record::{Caller, CollectionRequirements, LogRecord, RecordFields};
    pub use crate::rotation::{RetentionPolicy, RotationPolicy};
    pub use crate::sink::{Colorize, ConsoleStream};
}

//! Handlers and their configuration
//!
//! A handler binds a level threshold, an optional predicate filter, a
//! compiled format plan, and a sink. Handlers are immutable after creation
//! and validated entirely at `add` time: a registered handler can never
//! fail later for configuration reasons.

use crate::error::{LogmillError, Result};
use crate::file::FileSink;
use crate::filter::Filter;
use crate::format::{self, Template};
use crate::level::{Level, LevelRegistry};
use crate::record::{CollectionRequirements, LogRecord};
use crate::report::ReportOnce;
use crate::rotation::{RetentionPolicy, RotationPolicy};
use crate::sink::{self, CallableFn, CallableSink, Colorize, ConsoleSink, ConsoleStream, Sink};
use std::path::{Path, PathBuf};

/// Where a handler writes.
pub enum SinkTarget {
    Console(ConsoleStream),
    Path(PathBuf),
    Callable(CallableFn),
}

impl From<ConsoleStream> for SinkTarget {
    fn from(stream: ConsoleStream) -> Self {
        Self::Console(stream)
    }
}

impl From<PathBuf> for SinkTarget {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for SinkTarget {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

/// Minimum level for a handler, by value, name, or number.
#[derive(Debug, Clone)]
pub enum LevelThreshold {
    Level(Level),
    Name(String),
    No(u16),
}

impl Default for LevelThreshold {
    fn default() -> Self {
        Self::Level(Level::Trace)
    }
}

impl From<Level> for LevelThreshold {
    fn from(level: Level) -> Self {
        Self::Level(level)
    }
}

impl From<&str> for LevelThreshold {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<u16> for LevelThreshold {
    fn from(no: u16) -> Self {
        Self::No(no)
    }
}

/// Configuration for a handler.
///
/// Defaults give a colorize-by-TTY console handler on stdout accepting
/// every level with the standard template.
pub struct HandlerConfig {
    /// Output target: console stream, file path, or callable
    pub sink: SinkTarget,
    /// Minimum level this handler accepts
    pub level: LevelThreshold,
    /// Format template (None uses the default template)
    pub format: Option<String>,
    /// Rotation spec: `"<N> <B|KB|MB|GB>"`, `"daily"`, `"hourly"`
    pub rotation: Option<String>,
    /// Retention spec: an integer keeps that many rotated files, `"<N> days"`
    /// deletes by age
    pub retention: Option<String>,
    /// Gzip rotated files
    pub compression: bool,
    /// Emit canonical JSON lines instead of the template
    pub serialize: bool,
    /// Predicate a record must pass
    pub filter: Option<Filter>,
    /// Route writes through a background worker (file sinks only)
    pub enqueue: bool,
    /// Channel capacity for enqueued mode
    pub queue_capacity: usize,
    /// Console color behavior
    pub colorize: Colorize,
    /// Explicit collection-requirements override (None derives from the
    /// plan and filter)
    pub collect: Option<CollectionRequirements>,
    /// Write buffer size in bytes for file sinks
    pub buffer_size: usize,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            sink: SinkTarget::Console(ConsoleStream::Stdout),
            level: LevelThreshold::default(),
            format: None,
            rotation: None,
            retention: None,
            compression: false,
            serialize: false,
            filter: None,
            enqueue: false,
            queue_capacity: 1024,
            colorize: Colorize::Auto,
            collect: None,
            buffer_size: 8192,
        }
    }
}

/// The faults a handler can hit per emission. Contained by the engine and
/// reported once per handler through the stderr fallback.
pub(crate) enum HandlerFault {
    Filter(String),
    Sink(LogmillError),
}

impl std::fmt::Display for HandlerFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerFault::Filter(message) => write!(f, "filter failed: {}", message),
            HandlerFault::Sink(error) => write!(f, "sink failed: {}", error),
        }
    }
}

/// An immutable binding of level, filter, format plan, and sink.
pub struct Handler {
    id: u64,
    level_no: u16,
    filter: Option<Filter>,
    template: Template,
    serialize: bool,
    sink: Sink,
    requirements: CollectionRequirements,
    pub(crate) fault: ReportOnce,
}

impl Handler {
    /// Validates the configuration and builds the handler. Every
    /// configuration error surfaces here, not during emission.
    pub(crate) fn build(id: u64, config: HandlerConfig, levels: &LevelRegistry) -> Result<Self> {
        let level_no = match &config.level {
            LevelThreshold::Level(level) => level.no(),
            LevelThreshold::No(no) => *no,
            LevelThreshold::Name(name) => {
                levels
                    .by_name(name)
                    .ok_or_else(|| LogmillError::InvalidLevel(name.clone()))?
                    .no
            }
        };

        let template = Template::compile(config.format.as_deref().unwrap_or(format::DEFAULT_FORMAT));

        let rotation = match config.rotation.as_deref() {
            Some(spec) => RotationPolicy::parse(spec)?,
            None => RotationPolicy::Never,
        };
        let retention = match config.retention.as_deref() {
            Some(spec) => RetentionPolicy::parse(spec)?,
            None => RetentionPolicy::None,
        };

        let sink = match config.sink {
            SinkTarget::Path(path) => Sink::File(FileSink::create(
                path,
                rotation,
                retention,
                config.compression,
                config.buffer_size,
                config.enqueue,
                config.queue_capacity,
            )?),
            SinkTarget::Console(stream) => {
                if config.enqueue {
                    return Err(LogmillError::InvalidConfig(
                        "enqueue is only supported for file sinks".to_string(),
                    ));
                }
                Sink::Console(ConsoleSink::new(stream, config.colorize))
            }
            SinkTarget::Callable(callable) => {
                if config.enqueue {
                    return Err(LogmillError::InvalidConfig(
                        "enqueue is only supported for file sinks".to_string(),
                    ));
                }
                Sink::Callable(CallableSink::new(callable))
            }
        };

        // Serialized output consults every optional field; an opaque filter
        // may inspect anything, so it forces full collection too.
        let requirements = config.collect.unwrap_or_else(|| {
            if config.serialize || config.filter.is_some() {
                CollectionRequirements::ALL
            } else {
                template.requirements()
            }
        });

        Ok(Self {
            id,
            level_no,
            filter: config.filter,
            template,
            serialize: config.serialize,
            sink,
            requirements,
            fault: ReportOnce::new(),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn level_no(&self) -> u16 {
        self.level_no
    }

    pub(crate) fn requirements(&self) -> CollectionRequirements {
        self.requirements
    }

    pub(crate) fn file_path(&self) -> Option<&Path> {
        match &self.sink {
            Sink::File(file) => Some(file.path()),
            _ => None,
        }
    }

    /// Records dropped by this handler's enqueued sink, if any.
    pub fn dropped(&self) -> u64 {
        match &self.sink {
            Sink::File(file) => file.dropped(),
            _ => 0,
        }
    }

    /// Runs this handler's slice of an emission: filter, format, dispatch.
    /// A filter rejection returns Ok; faults bubble up for once-only
    /// reporting by the engine.
    pub(crate) fn handle(&self, record: &LogRecord) -> std::result::Result<(), HandlerFault> {
        if record.level_no() < self.level_no {
            return Ok(());
        }
        if let Some(filter) = &self.filter {
            match filter.evaluate(record) {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(message) => return Err(HandlerFault::Filter(message)),
            }
        }

        let rendered = if self.serialize {
            format::serialize_record(record)
        } else {
            self.template.render(record)
        };

        sink::dispatch(&self.sink, &rendered, self.serialize).map_err(HandlerFault::Sink)
    }

    pub(crate) fn flush(&self) -> Result<()> {
        self.sink.flush()
    }

    pub(crate) fn shutdown(&self) {
        self.sink.shutdown();
    }
}

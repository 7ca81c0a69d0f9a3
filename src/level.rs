//! Log levels and the level registry
//!
//! Defines 8 built-in log levels with numeric severities and a copy-on-write
//! registry for user-defined levels. The registry is consulted on every
//! emission that passes a level by name, so lookups are a single lock-free
//! load; mutations clone and swap the whole table.

use crate::colorize;
use crate::error::{LogmillError, Result};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Built-in log levels with numeric severities.
///
/// Levels are ordered by severity, with lower numbers being less severe.
/// The built-in set is always present in the registry and may not be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    /// Trace level (severity 5) - Most verbose, for detailed debugging
    Trace = 5,
    /// Debug level (severity 10) - Debugging information
    Debug = 10,
    /// Info level (severity 20) - General information
    Info = 20,
    /// Success level (severity 25) - Successful operations
    Success = 25,
    /// Warning level (severity 30) - Warning messages
    Warning = 30,
    /// Error level (severity 40) - Error conditions
    Error = 40,
    /// Fail level (severity 45) - Operation failures
    Fail = 45,
    /// Critical level (severity 50) - Critical errors
    Critical = 50,
}

impl PartialOrd for Level {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Level {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (*self as u16).cmp(&(*other as u16))
    }
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Success => "SUCCESS",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Fail => "FAIL",
            Level::Critical => "CRITICAL",
        }
    }

    pub fn no(&self) -> u16 {
        *self as u16
    }

    /// Default markup style applied to the rendered level name on colorized
    /// console sinks.
    pub fn default_style(&self) -> &'static str {
        match self {
            Level::Trace => "cyan",
            Level::Debug => "blue",
            Level::Info => "white",
            Level::Success => "green",
            Level::Warning => "yellow",
            Level::Error => "red",
            Level::Fail => "magenta",
            Level::Critical => "bright_red bold",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Level::Trace => "🔍",
            Level::Debug => "🐞",
            Level::Info => "ℹ️",
            Level::Success => "✅",
            Level::Warning => "⚠️",
            Level::Error => "❌",
            Level::Fail => "🚫",
            Level::Critical => "☠️",
        }
    }

    pub fn all_levels() -> Vec<Level> {
        vec![
            Level::Trace,
            Level::Debug,
            Level::Info,
            Level::Success,
            Level::Warning,
            Level::Error,
            Level::Fail,
            Level::Critical,
        ]
    }

    pub fn from_no(no: u16) -> Option<Self> {
        match no {
            5 => Some(Level::Trace),
            10 => Some(Level::Debug),
            20 => Some(Level::Info),
            25 => Some(Level::Success),
            30 => Some(Level::Warning),
            40 => Some(Level::Error),
            45 => Some(Level::Fail),
            50 => Some(Level::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Level {
    type Err = LogmillError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "TRACE" => Ok(Level::Trace),
            "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "SUCCESS" => Ok(Level::Success),
            "WARNING" | "WARN" => Ok(Level::Warning),
            "ERROR" => Ok(Level::Error),
            "FAIL" => Ok(Level::Fail),
            "CRITICAL" | "CRIT" => Ok(Level::Critical),
            _ => Err(LogmillError::InvalidLevel(s.to_string())),
        }
    }
}

/// A registered level: built-in or user-defined.
///
/// `style` is a space-separated list of markup tag names (e.g. `"red"` or
/// `"bright_red bold"`) applied to the level name on colorized output.
#[derive(Debug, Clone)]
pub struct LevelSpec {
    pub no: u16,
    pub name: Arc<str>,
    pub style: Option<String>,
    pub icon: Option<String>,
}

impl LevelSpec {
    fn builtin(level: Level) -> Self {
        Self {
            no: level.no(),
            name: Arc::from(level.as_str()),
            style: Some(level.default_style().to_string()),
            icon: Some(level.icon().to_string()),
        }
    }
}

struct LevelTable {
    // keyed by uppercased name
    by_name: HashMap<String, Arc<LevelSpec>>,
    by_no: BTreeMap<u16, Arc<LevelSpec>>,
}

impl LevelTable {
    fn builtin() -> Self {
        let mut by_name = HashMap::new();
        let mut by_no = BTreeMap::new();
        for level in Level::all_levels() {
            let spec = Arc::new(LevelSpec::builtin(level));
            by_name.insert(level.as_str().to_string(), Arc::clone(&spec));
            by_no.insert(level.no(), spec);
        }
        Self { by_name, by_no }
    }
}

/// Ordered set of severity levels, built-in plus user-defined.
///
/// Reads are a single atomic load of the current table; registrations clone
/// the table under a writer mutex and swap it in atomically.
pub struct LevelRegistry {
    table: ArcSwap<LevelTable>,
    write_lock: Mutex<()>,
}

impl LevelRegistry {
    pub fn new() -> Self {
        Self {
            table: ArcSwap::from_pointee(LevelTable::builtin()),
            write_lock: Mutex::new(()),
        }
    }

    /// Registers a custom level.
    ///
    /// A duplicate name with a different severity is rejected; re-registering
    /// an identical (name, no) pair is idempotent. Style names are validated
    /// against the markup vocabulary.
    pub fn register(
        &self,
        name: &str,
        no: u16,
        style: Option<&str>,
        icon: Option<&str>,
    ) -> Result<Arc<LevelSpec>> {
        if name.trim().is_empty() {
            return Err(LogmillError::InvalidLevel("empty level name".to_string()));
        }
        if let Some(style) = style {
            for tag in style.split_whitespace() {
                if colorize::canonical_tag(tag).is_none() {
                    return Err(LogmillError::InvalidConfig(format!(
                        "unknown style '{}' for level {}",
                        tag, name
                    )));
                }
            }
        }

        let key = name.to_uppercase();
        let _guard = self.write_lock.lock();
        let current = self.table.load();
        if let Some(existing) = current.by_name.get(&key) {
            if existing.no != no {
                return Err(LogmillError::LevelConflict(format!(
                    "{} is registered with severity {}",
                    name, existing.no
                )));
            }
            return Ok(Arc::clone(existing));
        }

        let spec = Arc::new(LevelSpec {
            no,
            name: Arc::from(key.as_str()),
            style: style.map(str::to_string),
            icon: icon.map(str::to_string),
        });
        let mut by_name = current.by_name.clone();
        let mut by_no = current.by_no.clone();
        by_name.insert(key, Arc::clone(&spec));
        by_no.entry(no).or_insert_with(|| Arc::clone(&spec));
        self.table.store(Arc::new(LevelTable { by_name, by_no }));
        Ok(spec)
    }

    pub fn by_name(&self, name: &str) -> Option<Arc<LevelSpec>> {
        self.table.load().by_name.get(&name.to_uppercase()).cloned()
    }

    pub fn by_no(&self, no: u16) -> Option<Arc<LevelSpec>> {
        self.table.load().by_no.get(&no).cloned()
    }

    /// Lowest severity currently registered.
    pub fn min_registered(&self) -> u16 {
        self.table
            .load()
            .by_no
            .keys()
            .next()
            .copied()
            .unwrap_or(u16::MAX)
    }

    pub(crate) fn spec_of(&self, level: Level) -> Arc<LevelSpec> {
        // Built-ins are always present.
        self.by_no(level.no())
            .unwrap_or_else(|| Arc::new(LevelSpec::builtin(level)))
    }
}

impl Default for LevelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

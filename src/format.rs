//! Format engine
//!
//! Compiles a format template into a reusable plan of literal runs and field
//! steps, renders records against it, and produces the canonical single-line
//! JSON serialization. Compilation happens once per handler; rendering never
//! fails, and unknown tokens render as the empty string so the hot path is
//! robust to typos.

use crate::colorize;
use crate::record::{CollectionRequirements, LogRecord};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

pub(crate) const DEFAULT_FORMAT: &str =
    "{time} | {level:<8} | {name}:{function}:{line} - {message}";

const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Align {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FieldKind {
    /// Wall-clock timestamp, with an optional pre-converted chrono pattern
    Time(Option<String>),
    Level,
    Message,
    Name,
    Function,
    Line,
    File,
    Elapsed,
    Thread,
    Process,
    Extra(String),
    /// Unrecognized token; renders empty
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Step {
    Literal(String),
    Field {
        kind: FieldKind,
        width: Option<usize>,
        align: Align,
    },
}

/// A compiled format template.
///
/// Parsing is infallible: malformed tokens degrade to literals or empty
/// fields instead of erroring, per the robustness contract of the hot path.
#[derive(Debug, Clone)]
pub struct Template {
    steps: Vec<Step>,
}

impl Template {
    pub fn compile(source: &str) -> Self {
        let mut steps = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) => {
                    if !literal.is_empty() {
                        steps.push(Step::Literal(std::mem::take(&mut literal)));
                    }
                    steps.push(parse_token(&after[..close]));
                    rest = &after[close + 1..];
                }
                None => {
                    // Unterminated brace: the rest is literal.
                    literal.push('{');
                    rest = after;
                    break;
                }
            }
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            steps.push(Step::Literal(literal));
        }

        Self { steps }
    }

    /// Which optional record fields this plan consults.
    pub fn requirements(&self) -> CollectionRequirements {
        let mut req = CollectionRequirements::NONE;
        for step in &self.steps {
            if let Step::Field { kind, .. } = step {
                match kind {
                    FieldKind::Name | FieldKind::Function | FieldKind::Line | FieldKind::File => {
                        req.caller = true
                    }
                    FieldKind::Thread => req.thread = true,
                    FieldKind::Process => req.process = true,
                    FieldKind::Elapsed => req.elapsed = true,
                    _ => {}
                }
            }
        }
        req
    }

    /// Renders a record to text. The output may contain markup tags (from
    /// the message, template literals, or the level style); the sink decides
    /// whether they become ANSI escapes or get stripped.
    pub fn render(&self, record: &LogRecord) -> String {
        let mut out = String::with_capacity(64 + record.message.len());
        for step in &self.steps {
            match step {
                Step::Literal(text) => out.push_str(text),
                Step::Field { kind, width, align } => {
                    if let FieldKind::Level = kind {
                        // Pad the raw name first so markup does not count
                        // toward the width.
                        let padded = pad(record.level_name(), *width, *align);
                        match &record.level.style {
                            Some(style) => out.push_str(&colorize::wrap_in_style(&padded, style)),
                            None => out.push_str(&padded),
                        }
                    } else {
                        let value = field_value(kind, record);
                        out.push_str(&pad(&value, *width, *align));
                    }
                }
            }
        }
        out
    }
}

fn parse_token(token: &str) -> Step {
    let (name, spec) = match token.split_once(':') {
        Some((name, spec)) => (name, Some(spec)),
        None => (token, None),
    };

    if name == "time" {
        let pattern = spec.and_then(checked_time_pattern);
        return Step::Field {
            kind: FieldKind::Time(pattern),
            width: None,
            align: Align::Left,
        };
    }

    let kind = if let Some(key) = name.strip_prefix("extra[").and_then(|k| k.strip_suffix(']')) {
        FieldKind::Extra(key.to_string())
    } else {
        match name {
            "level" => FieldKind::Level,
            "message" => FieldKind::Message,
            "name" => FieldKind::Name,
            "function" => FieldKind::Function,
            "line" => FieldKind::Line,
            "file" => FieldKind::File,
            "elapsed" => FieldKind::Elapsed,
            "thread" => FieldKind::Thread,
            "process" => FieldKind::Process,
            _ => FieldKind::Unknown,
        }
    };

    let (width, align) = spec.map(parse_width).unwrap_or((None, Align::Left));
    Step::Field { kind, width, align }
}

fn parse_width(spec: &str) -> (Option<usize>, Align) {
    let (align, digits) = match spec.as_bytes().first() {
        Some(b'<') => (Align::Left, &spec[1..]),
        Some(b'>') => (Align::Right, &spec[1..]),
        _ => (Align::Left, spec),
    };
    match digits.parse::<usize>() {
        Ok(width) => (Some(width), align),
        // Malformed width spec: fall back to natural width.
        Err(_) => (None, Align::Left),
    }
}

fn pad(value: &str, width: Option<usize>, align: Align) -> String {
    match width {
        Some(width) if value.chars().count() < width => {
            let fill = width - value.chars().count();
            match align {
                Align::Left => format!("{}{}", value, " ".repeat(fill)),
                Align::Right => format!("{}{}", " ".repeat(fill), value),
            }
        }
        _ => value.to_string(),
    }
}

fn field_value(kind: &FieldKind, record: &LogRecord) -> String {
    match kind {
        FieldKind::Time(pattern) => record
            .timestamp
            .format(pattern.as_deref().unwrap_or(DEFAULT_TIME_FORMAT))
            .to_string(),
        FieldKind::Message => record.message.clone(),
        FieldKind::Name => caller_part(record, |c| c.name.clone()),
        FieldKind::Function => caller_part(record, |c| c.function.clone()),
        FieldKind::File => caller_part(record, |c| c.file.clone()),
        FieldKind::Line => record
            .caller
            .as_ref()
            .and_then(|c| c.line)
            .map(|l| l.to_string())
            .unwrap_or_default(),
        FieldKind::Elapsed => record.elapsed.map(format_elapsed).unwrap_or_default(),
        FieldKind::Thread => record
            .thread
            .as_ref()
            .map(|t| t.name.clone().unwrap_or_else(|| t.id.to_string()))
            .unwrap_or_default(),
        FieldKind::Process => record
            .process
            .as_ref()
            .map(|p| p.name.clone())
            .unwrap_or_default(),
        FieldKind::Extra(key) => record.extra.get(key).map(value_text).unwrap_or_default(),
        FieldKind::Unknown => String::new(),
        // Handled inline by render so the level style can wrap the padded name.
        FieldKind::Level => record.level_name().to_string(),
    }
}

fn caller_part(record: &LogRecord, f: impl Fn(&crate::record::Caller) -> Option<String>) -> String {
    record
        .caller
        .as_ref()
        .and_then(f)
        .unwrap_or_default()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Renders a duration as `HH:MM:SS.mmm`; hours grow without wrapping.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60,
        elapsed.subsec_millis()
    )
}

/// Converts date patterns like `YYYY-MM-DD HH:mm:ss.SSS` to chrono
/// format specifiers. Done once at template compilation.
fn convert_time_pattern(pattern: &str) -> String {
    pattern
        .replace("YYYY", "%Y")
        .replace("YY", "%y")
        .replace("MM", "%m")
        .replace("DD", "%d")
        .replace("HH", "%H")
        .replace("mm", "%M")
        .replace("ss", "%S")
        .replace("SSS", "%3f")
}

/// A pattern that would fail chrono formatting (stray `%`, unknown
/// specifier) falls back to the default format; rendering must not fail.
fn checked_time_pattern(pattern: &str) -> Option<String> {
    let converted = convert_time_pattern(pattern);
    let valid = chrono::format::StrftimeItems::new(&converted)
        .all(|item| !matches!(item, chrono::format::Item::Error));
    valid.then_some(converted)
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    time: String,
    level: &'a str,
    message: &'a str,
    name: Option<&'a str>,
    function: Option<&'a str>,
    line: Option<u32>,
    file: Option<&'a str>,
    elapsed: Option<String>,
    thread_name: Option<&'a str>,
    thread_id: Option<u64>,
    process_name: Option<&'a str>,
    process_id: Option<u32>,
    exception: Option<&'a str>,
    extra: &'a BTreeMap<String, Value>,
}

/// Canonical JSON serialization: one object, fixed key set, absent fields
/// as null. The trailing newline is added by the sink.
pub fn serialize_record(record: &LogRecord) -> String {
    let caller = record.caller.as_ref();
    let view = JsonRecord {
        time: record
            .timestamp
            .format("%Y-%m-%dT%H:%M:%S%.3f%:z")
            .to_string(),
        level: record.level_name(),
        message: &record.message,
        name: caller.and_then(|c| c.name.as_deref()),
        function: caller.and_then(|c| c.function.as_deref()),
        line: caller.and_then(|c| c.line),
        file: caller.and_then(|c| c.file.as_deref()),
        elapsed: record.elapsed.map(format_elapsed),
        thread_name: record.thread.as_ref().and_then(|t| t.name.as_deref()),
        thread_id: record.thread.as_ref().map(|t| t.id),
        process_name: record.process.as_ref().map(|p| p.name.as_str()),
        process_id: record.process.as_ref().map(|p| p.id),
        exception: record.exception.as_deref(),
        extra: &record.extra,
    };
    serde_json::to_string(&view).unwrap_or_else(|_| "{}".to_string())
}

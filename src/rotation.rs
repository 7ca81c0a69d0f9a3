//! Rotation, retention, and compression policies
//!
//! Rotation decides when the active file is closed and renamed; retention
//! decides which rotated segments to delete afterwards; compression gzips
//! freshly rotated segments in the background. All three operate on rotated
//! files only and never touch the active file.

use crate::error::{LogmillError, Result};
use crate::report;
use chrono::{DateTime, Local};
use flate2::Compression;
use flate2::write::GzEncoder;
use regex::Regex;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Policy for determining when to rotate the active log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationPolicy {
    #[default]
    Never,
    /// Rotate before a write would reach the given size in bytes
    Size(u64),
    /// Rotate when the local calendar day changes
    Daily,
    /// Rotate when the local hour changes
    Hourly,
}

impl RotationPolicy {
    /// Parses a rotation spec: `"daily"`, `"hourly"`, or `"<N> <unit>"`
    /// with unit in B/KB/MB/GB (case-insensitive, spacing optional).
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        match spec.to_lowercase().as_str() {
            "daily" => return Ok(Self::Daily),
            "hourly" => return Ok(Self::Hourly),
            "never" => return Ok(Self::Never),
            _ => {}
        }
        parse_size(spec)
            .map(Self::Size)
            .ok_or_else(|| LogmillError::InvalidConfig(format!("invalid rotation spec: {}", spec)))
    }

    /// Tag of the period `now` falls in, for time-based policies.
    pub(crate) fn period_tag(&self, now: DateTime<Local>) -> Option<String> {
        match self {
            Self::Daily => Some(now.format("%Y-%m-%d").to_string()),
            Self::Hourly => Some(now.format("%Y-%m-%d_%H").to_string()),
            Self::Never | Self::Size(_) => None,
        }
    }
}

/// Policy for cleaning up rotated segments after a rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetentionPolicy {
    #[default]
    None,
    /// Keep at most this many rotated segments
    Count(usize),
    /// Delete rotated segments older than this
    Age(Duration),
}

impl RetentionPolicy {
    /// Parses a retention spec: a bare integer is a count, `"<N> days"`
    /// (also hours/weeks) is an age.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if let Ok(count) = spec.parse::<usize>() {
            return Ok(Self::Count(count));
        }
        let lower = spec.to_lowercase();
        let (number, unit) = lower
            .split_once(char::is_whitespace)
            .ok_or_else(|| LogmillError::InvalidConfig(format!("invalid retention spec: {}", spec)))?;
        let n: u64 = number.parse().map_err(|_| {
            LogmillError::InvalidConfig(format!("invalid retention spec: {}", spec))
        })?;
        let seconds = match unit.trim() {
            "hour" | "hours" => n * 3600,
            "day" | "days" => n * 86_400,
            "week" | "weeks" => n * 7 * 86_400,
            _ => {
                return Err(LogmillError::InvalidConfig(format!(
                    "invalid retention unit: {}",
                    unit
                )));
            }
        };
        Ok(Self::Age(Duration::from_secs(seconds)))
    }
}

fn parse_size(spec: &str) -> Option<u64> {
    let spec = spec.trim().to_uppercase();
    let split = spec
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(spec.len());
    if split == 0 {
        return None;
    }
    let number: u64 = spec[..split].parse().ok()?;
    let multiplier = match spec[split..].trim() {
        "B" | "" => 1,
        "KB" => 1024,
        "MB" => 1024 * 1024,
        "GB" => 1024 * 1024 * 1024,
        _ => return None,
    };
    Some(number * multiplier)
}

/// Stem and extension of the active file, the pieces rotated names are
/// built from: `app.log` rotates to `app.<tag>.log`.
pub(crate) struct NameParts {
    pub dir: PathBuf,
    pub stem: String,
    /// Extension including the leading dot, or empty
    pub ext: String,
}

impl NameParts {
    pub(crate) fn of(path: &Path) -> Result<Self> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| LogmillError::InvalidConfig(format!("invalid path: {:?}", path)))?
            .to_string();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(Self { dir, stem, ext })
    }

    pub(crate) fn rotated_path(&self, tag: &str) -> PathBuf {
        self.dir.join(format!("{}.{}{}", self.stem, tag, self.ext))
    }

    fn rotated_pattern(&self) -> Regex {
        // Matches "{stem}.{tag}{ext}" with an optional ".gz" suffix.
        let pattern = format!(
            "^{}\\.(.+){}(\\.gz)?$",
            regex::escape(&self.stem),
            regex::escape(&self.ext)
        );
        Regex::new(&pattern).expect("rotated-name pattern is valid")
    }
}

/// Rotated siblings of the active file, as (path, mtime) pairs. The active
/// file itself never matches the pattern.
pub(crate) fn rotated_files(parts: &NameParts) -> io::Result<Vec<(PathBuf, SystemTime)>> {
    let pattern = parts.rotated_pattern();
    let mut files = Vec::new();
    for entry in fs::read_dir(&parts.dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if !pattern.is_match(name) {
            continue;
        }
        let mtime = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        files.push((entry.path(), mtime));
    }
    Ok(files)
}

/// Next free ordinal for size-based rotation. Scans existing rotated
/// segments (gzipped or not) so a restarted process never clobbers one.
pub(crate) fn next_ordinal(parts: &NameParts) -> u64 {
    let pattern = format!(
        "^{}\\.([0-9]+){}(\\.gz)?$",
        regex::escape(&parts.stem),
        regex::escape(&parts.ext)
    );
    let Ok(re) = Regex::new(&pattern) else {
        return 1;
    };
    let mut max = 0;
    if let Ok(entries) = fs::read_dir(&parts.dir) {
        for entry in entries.flatten() {
            if let Some(name) = entry.file_name().to_str()
                && let Some(caps) = re.captures(name)
                && let Ok(ordinal) = caps[1].parse::<u64>()
            {
                max = max.max(ordinal);
            }
        }
    }
    max + 1
}

/// Applies the retention policy to rotated segments. Deletion failures are
/// reported and skipped; the write path never fails on retention.
pub(crate) fn apply_retention(policy: RetentionPolicy, parts: &NameParts) {
    let mut files = match rotated_files(parts) {
        Ok(files) => files,
        Err(e) => {
            report::report_error("retention scan", &e);
            return;
        }
    };

    let doomed: Vec<PathBuf> = match policy {
        RetentionPolicy::None => return,
        RetentionPolicy::Count(keep) => {
            if files.len() <= keep {
                return;
            }
            // Path as a tiebreak keeps ordering deterministic on coarse
            // mtime filesystems.
            files.sort_by(|(pa, ma), (pb, mb)| ma.cmp(mb).then_with(|| pa.cmp(pb)));
            let excess = files.len() - keep;
            files.into_iter().take(excess).map(|(p, _)| p).collect()
        }
        RetentionPolicy::Age(age) => {
            let cutoff = SystemTime::now().checked_sub(age);
            let Some(cutoff) = cutoff else { return };
            files
                .into_iter()
                .filter(|(_, mtime)| *mtime < cutoff)
                .map(|(p, _)| p)
                .collect()
        }
    };

    for path in doomed {
        if let Err(e) = fs::remove_file(&path) {
            report::report_error("retention delete", &e);
        }
    }
}

/// Gzips a rotated segment in place: `foo.TAG.log` becomes
/// `foo.TAG.log.gz` and the original is removed.
pub(crate) fn compress_file(path: &Path) -> io::Result<()> {
    let mut source = File::open(path)?;
    let target_path = PathBuf::from(format!("{}.gz", path.display()));
    let target = File::create(&target_path)?;
    let mut encoder = GzEncoder::new(target, Compression::default());
    io::copy(&mut source, &mut encoder)?;
    encoder.finish()?;
    fs::remove_file(path)?;
    Ok(())
}

/// Compression deferred to a background task; the caller returns as soon as
/// the raw rotated file exists.
pub(crate) fn spawn_compress(path: PathBuf) {
    let spawned = std::thread::Builder::new()
        .name("logmill-gzip".to_string())
        .spawn(move || {
            if let Err(e) = compress_file(&path) {
                report::report_error("compression", &e);
            }
        });
    if let Err(e) = spawned {
        report::report_error("compression spawn", &e);
    }
}

//! File sink
//!
//! A buffered writer plus rotation state. Each write renders to bytes,
//! evaluates the rotation policy, rotates if needed (rename, reopen, then
//! retention and compression on the rotated set), and appends the line.
//! In sync mode the writer lives behind a mutex on the producer side; in
//! enqueued mode it is owned by a dedicated worker thread.

use crate::error::Result;
use crate::report;
use crate::rotation::{self, NameParts, RetentionPolicy, RotationPolicy};
use crate::worker::{self, Worker};
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Rotation-aware buffered writer. Not thread-safe by itself; the owning
/// sink serializes access.
pub(crate) struct FileWriter {
    path: PathBuf,
    parts: NameParts,
    writer: Option<BufWriter<File>>,
    buffer_size: usize,
    bytes_written: u64,
    /// Period tag of the active file, for time-based rotation
    period: Option<String>,
    rotation: RotationPolicy,
    retention: RetentionPolicy,
    compress: bool,
}

impl FileWriter {
    pub(crate) fn open(
        path: PathBuf,
        rotation: RotationPolicy,
        retention: RetentionPolicy,
        compress: bool,
        buffer_size: usize,
    ) -> Result<Self> {
        let parts = NameParts::of(&path)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let meta = file.metadata()?;
        let bytes_written = meta.len();

        // An existing non-empty file keeps the period of its last write, so
        // a restart across a boundary still rotates before appending.
        let period = if bytes_written > 0 {
            let mtime = meta
                .modified()
                .map(DateTime::<Local>::from)
                .unwrap_or_else(|_| Local::now());
            rotation.period_tag(mtime)
        } else {
            rotation.period_tag(Local::now())
        };

        Ok(Self {
            path,
            parts,
            writer: Some(BufWriter::with_capacity(buffer_size, file)),
            buffer_size,
            bytes_written,
            period,
            rotation,
            retention,
            compress,
        })
    }

    /// Appends one line (terminator added here), rotating first if the
    /// policy demands it. `now` is passed in so the rotation decision is
    /// testable against a fixed clock.
    pub(crate) fn write_line(&mut self, line: &[u8], now: DateTime<Local>) -> Result<()> {
        let incoming = line.len() as u64 + 1;
        if self.should_rotate(incoming, now) {
            self.rotate(now)?;
        }
        self.ensure_open()?;
        if let Err(e) = self.append(line) {
            // Drop the writer so the next write attempts a reopen.
            self.writer = None;
            return Err(e.into());
        }
        self.bytes_written += incoming;
        Ok(())
    }

    fn append(&mut self, line: &[u8]) -> std::io::Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(std::io::Error::other("writer unavailable"));
        };
        writer.write_all(line)?;
        writer.write_all(b"\n")
    }

    fn ensure_open(&mut self) -> Result<()> {
        if self.writer.is_some() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.bytes_written = file.metadata().map(|m| m.len()).unwrap_or(0);
        self.writer = Some(BufWriter::with_capacity(self.buffer_size, file));
        Ok(())
    }

    fn should_rotate(&self, incoming: u64, now: DateTime<Local>) -> bool {
        match self.rotation {
            RotationPolicy::Never => false,
            // An empty active file never rotates; an oversized record lands
            // in the fresh segment whole.
            RotationPolicy::Size(threshold) => {
                self.bytes_written > 0 && self.bytes_written + incoming >= threshold
            }
            RotationPolicy::Daily | RotationPolicy::Hourly => {
                self.rotation.period_tag(now) != self.period
            }
        }
    }

    fn rotate(&mut self, now: DateTime<Local>) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        self.writer = None;

        // Time-based rotation tags the segment with the departing period;
        // size-based rotation uses the next free ordinal.
        let tag = match (&self.rotation, &self.period) {
            (RotationPolicy::Daily | RotationPolicy::Hourly, Some(period)) => period.clone(),
            _ => rotation::next_ordinal(&self.parts).to_string(),
        };
        let rotated = self.free_rotated_path(&tag);
        if self.path.exists() {
            std::fs::rename(&self.path, &rotated)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.writer = Some(BufWriter::with_capacity(self.buffer_size, file));
        self.bytes_written = 0;
        self.period = self.rotation.period_tag(now);

        rotation::apply_retention(self.retention, &self.parts);
        if self.compress && rotated.exists() {
            rotation::spawn_compress(rotated);
        }
        Ok(())
    }

    /// Resolves tag collisions (e.g. a restart rotating into a period that
    /// already has a segment) by suffixing a counter.
    fn free_rotated_path(&self, tag: &str) -> PathBuf {
        let candidate = self.parts.rotated_path(tag);
        if !candidate.exists() {
            return candidate;
        }
        let mut n = 2u32;
        loop {
            let candidate = self.parts.rotated_path(&format!("{}.{}", tag, n));
            if !candidate.exists() {
                return candidate;
            }
            n += 1;
        }
    }

    pub(crate) fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}

enum FileMode {
    Sync(Mutex<FileWriter>),
    Enqueued(Worker),
}

/// Terminal file writer for a handler: sync or enqueued.
pub struct FileSink {
    path: PathBuf,
    mode: FileMode,
}

impl FileSink {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn create(
        path: PathBuf,
        rotation: RotationPolicy,
        retention: RetentionPolicy,
        compress: bool,
        buffer_size: usize,
        enqueue: bool,
        queue_capacity: usize,
    ) -> Result<Self> {
        let writer = FileWriter::open(path.clone(), rotation, retention, compress, buffer_size)?;
        let mode = if enqueue {
            FileMode::Enqueued(worker::spawn(writer, queue_capacity))
        } else {
            FileMode::Sync(Mutex::new(writer))
        };
        Ok(Self { path, mode })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn write(&self, line: &str) -> Result<()> {
        match &self.mode {
            FileMode::Sync(writer) => writer.lock().write_line(line.as_bytes(), Local::now()),
            FileMode::Enqueued(worker) => {
                worker.push(line.as_bytes().to_vec());
                Ok(())
            }
        }
    }

    /// Flushes buffered output; for an enqueued sink this waits for the
    /// worker to drain the channel.
    pub(crate) fn flush(&self) -> Result<()> {
        match &self.mode {
            FileMode::Sync(writer) => writer.lock().flush(),
            FileMode::Enqueued(worker) => {
                worker.flush();
                Ok(())
            }
        }
    }

    /// Drains and stops the worker (enqueued mode) or flushes (sync mode).
    pub(crate) fn shutdown(&self) {
        match &self.mode {
            FileMode::Sync(writer) => {
                if let Err(e) = writer.lock().flush() {
                    report::report_error("file sink shutdown", &e);
                }
            }
            FileMode::Enqueued(worker) => worker.stop(),
        }
    }

    /// Records dropped by the enqueued path (full channel past the bounded
    /// wait, quarantine, or shutdown timeout).
    pub fn dropped(&self) -> u64 {
        match &self.mode {
            FileMode::Sync(_) => 0,
            FileMode::Enqueued(worker) => worker.dropped(),
        }
    }
}

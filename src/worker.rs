//! Async dispatch worker
//!
//! One background worker per enqueued file sink, fed by a bounded MPSC
//! channel. Producers push rendered bytes and never block on I/O; the
//! worker drains FIFO and runs the synchronous write path. Shutdown is a
//! sentinel plus a bounded join; a dead worker quarantines the sink.

use crate::file::FileWriter;
use crate::report::{self, ReportOnce};
use chrono::Local;
use crossbeam_channel::{Receiver, SendTimeoutError, Sender, bounded};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

/// How long a producer waits on a full channel before dropping the record.
const PUSH_WAIT: Duration = Duration::from_millis(100);
/// Bounded wait for flush acknowledgements and shutdown joins.
const DRAIN_WAIT: Duration = Duration::from_secs(5);
/// Drop reports go out on the first drop and every Nth after.
const DROP_REPORT_EVERY: u64 = 1000;

enum Job {
    Write(Vec<u8>),
    Flush(Sender<()>),
    Stop,
}

/// Producer-side handle to a sink worker.
pub(crate) struct Worker {
    tx: Sender<Job>,
    done_rx: Receiver<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
    dropped: AtomicU64,
    quarantine: ReportOnce,
}

pub(crate) fn spawn(mut writer: FileWriter, capacity: usize) -> Worker {
    let (tx, rx) = bounded::<Job>(capacity);
    let (done_tx, done_rx) = bounded::<()>(1);

    let handle = std::thread::Builder::new()
        .name("logmill-writer".to_string())
        .spawn(move || {
            while let Ok(job) = rx.recv() {
                match job {
                    Job::Write(line) => {
                        if let Err(e) = writer.write_line(&line, Local::now()) {
                            report::report_error("enqueued file write", &e);
                        }
                    }
                    Job::Flush(ack) => {
                        if let Err(e) = writer.flush() {
                            report::report_error("enqueued file flush", &e);
                        }
                        let _ = ack.send(());
                    }
                    Job::Stop => break,
                }
            }
            if let Err(e) = writer.flush() {
                report::report_error("enqueued file flush", &e);
            }
            let _ = done_tx.send(());
        })
        .ok();

    if handle.is_none() {
        report::report_error("worker spawn", &"failed to spawn writer thread");
    }

    Worker {
        tx,
        done_rx,
        handle: Mutex::new(handle),
        dropped: AtomicU64::new(0),
        quarantine: ReportOnce::new(),
    }
}

impl Worker {
    /// Pushes one rendered line. Blocks up to [`PUSH_WAIT`] when the channel
    /// is full, then drops the record and counts it.
    pub(crate) fn push(&self, line: Vec<u8>) {
        if self.quarantine.has_fired() {
            self.count_drop();
            return;
        }
        match self.tx.send_timeout(Job::Write(line), PUSH_WAIT) {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(_)) => self.count_drop(),
            Err(SendTimeoutError::Disconnected(_)) => {
                self.quarantine
                    .report("enqueued sink", &"worker terminated; sink quarantined");
                self.count_drop();
            }
        }
    }

    fn count_drop(&self) {
        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        if total == 1 || total % DROP_REPORT_EVERY == 0 {
            report::report_error(
                "enqueued sink",
                &format!("{} record(s) dropped so far", total),
            );
        }
    }

    /// Waits until every record pushed before this call has been written.
    pub(crate) fn flush(&self) {
        if self.quarantine.has_fired() {
            return;
        }
        let (ack_tx, ack_rx) = bounded::<()>(1);
        if self.tx.send_timeout(Job::Flush(ack_tx), DRAIN_WAIT).is_err() {
            return;
        }
        let _ = ack_rx.recv_timeout(DRAIN_WAIT);
    }

    /// Sends the stop sentinel and joins with a bounded wait. Records still
    /// in flight past the wait are dropped and counted.
    pub(crate) fn stop(&self) {
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        let _ = self.tx.send_timeout(Job::Stop, DRAIN_WAIT);
        match self.done_rx.recv_timeout(DRAIN_WAIT) {
            Ok(()) | Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                // Abandon the worker; account for whatever it never drained.
                let stuck = self.tx.len() as u64;
                if stuck > 0 {
                    self.dropped.fetch_add(stuck, Ordering::Relaxed);
                    report::report_error(
                        "enqueued sink shutdown",
                        &format!("{} record(s) dropped at shutdown", stuck),
                    );
                }
            }
        }
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

//! Sink variants
//!
//! A sink is the terminal writer of a handler: a standard stream, a
//! rotating file, or a user callable. Handler code is generic over the
//! variant through a uniform line-dispatch operation.

use crate::colorize;
use crate::error::{LogmillError, Result};
use crate::file::FileSink;
use serde::{Deserialize, Serialize};
use std::io::{IsTerminal, Write};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Standard stream a console sink writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleStream {
    Stdout,
    Stderr,
}

/// Console color behavior: `Auto` enables color iff the stream is a
/// terminal; `Always` and `Never` force the choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colorize {
    #[default]
    Auto,
    Always,
    Never,
}

/// Writes formatted records to a standard stream, optionally applying ANSI
/// color. The stream's own lock is held for one whole record so concurrent
/// emissions keep lines atomic.
pub struct ConsoleSink {
    stream: ConsoleStream,
    colorize: Colorize,
}

impl ConsoleSink {
    pub(crate) fn new(stream: ConsoleStream, colorize: Colorize) -> Self {
        Self { stream, colorize }
    }

    pub(crate) fn should_colorize(&self) -> bool {
        match self.colorize {
            Colorize::Always => true,
            Colorize::Never => false,
            Colorize::Auto => match self.stream {
                ConsoleStream::Stdout => std::io::stdout().is_terminal(),
                ConsoleStream::Stderr => std::io::stderr().is_terminal(),
            },
        }
    }

    pub(crate) fn write_line(&self, text: &str) -> Result<()> {
        match self.stream {
            ConsoleStream::Stdout => {
                let stdout = std::io::stdout();
                let mut lock = stdout.lock();
                writeln!(lock, "{}", text)?;
                lock.flush()?;
            }
            ConsoleStream::Stderr => {
                let stderr = std::io::stderr();
                let mut lock = stderr.lock();
                writeln!(lock, "{}", text)?;
            }
        }
        Ok(())
    }
}

/// User function a callable sink hands rendered strings to.
///
/// The string carries no trailing newline. `Err` returns are reported
/// through the fallback and never reach the producer.
pub type CallableFn = Arc<dyn Fn(&str) -> std::result::Result<(), String> + Send + Sync>;

/// Hands each rendered record to a user-supplied function. Panics inside
/// the callable are caught at the boundary.
pub struct CallableSink {
    callable: CallableFn,
}

impl CallableSink {
    pub(crate) fn new(callable: CallableFn) -> Self {
        Self { callable }
    }

    pub(crate) fn invoke(&self, text: &str) -> Result<()> {
        let outcome = catch_unwind(AssertUnwindSafe(|| (self.callable)(text)));
        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(message)) => Err(LogmillError::CallableFailed(message)),
            Err(_) => Err(LogmillError::CallableFailed("callable panicked".to_string())),
        }
    }
}

/// A log output destination.
pub enum Sink {
    Console(ConsoleSink),
    File(FileSink),
    Callable(CallableSink),
}

impl Sink {
    pub(crate) fn flush(&self) -> Result<()> {
        match self {
            Sink::Console(_) | Sink::Callable(_) => Ok(()),
            Sink::File(file) => file.flush(),
        }
    }

    pub(crate) fn shutdown(&self) {
        if let Sink::File(file) = self {
            file.shutdown();
        }
    }
}

/// Resolves the markup in `rendered` the way this sink wants it and hands
/// the line off. JSON lines skip the markup pass; the message is user
/// content there.
pub(crate) fn dispatch(sink: &Sink, rendered: &str, serialized: bool) -> Result<()> {
    match sink {
        Sink::Console(console) => {
            let line = if serialized {
                rendered.to_string()
            } else if console.should_colorize() {
                colorize::paint(rendered)
            } else {
                colorize::strip(rendered)
            };
            console.write_line(&line)
        }
        Sink::File(file) => {
            if serialized {
                file.write(rendered)
            } else {
                file.write(&colorize::strip(rendered))
            }
        }
        Sink::Callable(callable) => {
            if serialized {
                callable.invoke(rendered)
            } else {
                callable.invoke(&colorize::strip(rendered))
            }
        }
    }
}

use std::io::{self, Write};
use std::process;

use crate::error::SplitError;

/// Standard Unix exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    InvalidUsage = 2,
    SignalPipe = 141, // 128 + SIGPIPE (13)
}

impl ExitCode {
    pub fn exit(self) -> ! {
        process::exit(self as i32)
    }

    /// Exit code for an error that ended the run
    pub fn for_error(err: &SplitError) -> Self {
        match err {
            SplitError::Config(_) => ExitCode::InvalidUsage,
            _ => ExitCode::GeneralError,
        }
    }
}

/// Cross-platform broken pipe detection
fn is_broken_pipe(e: &io::Error) -> bool {
    #[cfg(windows)]
    {
        e.kind() == io::ErrorKind::BrokenPipe
            || e.raw_os_error() == Some(232) // ERROR_NO_DATA
            || e.raw_os_error() == Some(109) // ERROR_BROKEN_PIPE
    }
    #[cfg(not(windows))]
    {
        e.kind() == io::ErrorKind::BrokenPipe
    }
}

/// Stdout writer that exits quietly when the reader goes away
pub struct SafeStdout<W: Write = io::Stdout> {
    out: W,
}

impl Default for SafeStdout {
    fn default() -> Self {
        Self::new()
    }
}

impl SafeStdout {
    pub fn new() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> SafeStdout<W> {
    pub fn with_writer(out: W) -> Self {
        Self { out }
    }

    /// Write one line. A broken pipe exits with 141; other errors are returned
    pub fn writeln(&mut self, data: &str) -> io::Result<()> {
        match writeln!(self.out, "{}", data).and_then(|_| self.out.flush()) {
            Err(e) if is_broken_pipe(&e) => ExitCode::SignalPipe.exit(),
            other => other,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Stderr writer for user-facing messages
pub struct SafeStderr {
    stderr: io::Stderr,
}

impl Default for SafeStderr {
    fn default() -> Self {
        Self::new()
    }
}

impl SafeStderr {
    pub fn new() -> Self {
        Self {
            stderr: io::stderr(),
        }
    }

    /// Write a line; if stderr itself is gone there is nobody left to tell
    pub fn writeln(&mut self, data: &str) {
        if writeln!(self.stderr, "{}", data).is_err() {
            ExitCode::GeneralError.exit();
        }
    }
}

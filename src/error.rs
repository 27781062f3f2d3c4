//! Error taxonomy for the split pipeline
//!
//! Only the variants marked fatal stop a run. Batch and writer failures are
//! collected into the run summary and logged once.

use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, SplitError>;

#[derive(Debug, thiserror::Error)]
pub enum SplitError {
    /// Fatal: the input could not be opened, nothing was started
    #[error("cannot open input '{}': {source}", path.display())]
    InputOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Fatal: reading failed after the pipeline was running
    #[error("failed to read input: {0}")]
    InputRead(#[source] io::Error),

    /// Fatal: the output directory could not be created
    #[error("cannot create output directory '{}': {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Fatal: the pending buffer grew past its bound without a boundary
    #[error(
        "unparseable input: no message boundary found within {limit} bytes \
         (raise --max-pending or check the input format)"
    )]
    UnparseableInput { limit: usize },

    /// One batch was not valid UTF-8 and was skipped
    #[error("batch {batch}: invalid UTF-8 at byte {valid_up_to}")]
    InvalidUtf8 { batch: u64, valid_up_to: usize },

    /// A worker panicked while processing one batch
    #[error("batch {batch}: worker panicked: {message}")]
    WorkerPanic { batch: u64, message: String },

    /// One year's writer failed; other years are unaffected
    #[error("writing {year} to '{}' failed: {source}", path.display())]
    WriterIo {
        year: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A writer thread panicked or never reported back
    #[error("writer for {year} did not finish: {message}")]
    WriterLost { year: String, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SplitError {
    /// Errors that abort the whole run rather than one unit of work
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SplitError::InputOpen { .. }
                | SplitError::InputRead(_)
                | SplitError::OutputDir { .. }
                | SplitError::UnparseableInput { .. }
                | SplitError::Config(_)
        )
    }

    pub(crate) fn writer_io(year: &str, path: &std::path::Path, source: io::Error) -> Self {
        SplitError::WriterIo {
            year: year.to_string(),
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Render a panic payload from `catch_unwind` or `JoinHandle::join`
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

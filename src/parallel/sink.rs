//! Year writer threads
//!
//! A fixed pool of writer threads pulls year jobs from a channel. For each
//! year the writer claims the year's queue from the router and drains it
//! into `<year>.html` until it sees the sentinel.

use crossbeam_channel::{Receiver, Sender};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{panic_message, Result, SplitError};
use crate::frame::DocumentFrame;

use super::tracker::YearRouter;
use super::types::{QueueItem, WriterReport};

/// Lifecycle of one year file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// File created, header written
    Open,
    /// At least one fragment written
    Draining,
    /// Footer written, file closed
    Closed,
}

/// Writes one year file
pub(crate) struct YearWriter {
    year: String,
    path: PathBuf,
    out: BufWriter<File>,
    state: WriterState,
    written: usize,
}

impl YearWriter {
    /// Create `<dir>/<year>.html` and write the header and container tag
    pub(crate) fn open(dir: &Path, year: &str, frame: &DocumentFrame) -> Result<Self> {
        let path = dir.join(format!("{}.html", year));
        let file = File::create(&path).map_err(|e| SplitError::writer_io(year, &path, e))?;

        let mut writer = Self {
            year: year.to_string(),
            path,
            out: BufWriter::new(file),
            state: WriterState::Open,
            written: 0,
        };
        writer.write_raw(&frame.header)?;
        writer.write_raw(&frame.container_open)?;
        tracing::debug!("{}: open", writer.year);
        Ok(writer)
    }

    pub(crate) fn state(&self) -> WriterState {
        self.state
    }

    fn write_raw(&mut self, text: &str) -> Result<()> {
        self.out
            .write_all(text.as_bytes())
            .map_err(|e| SplitError::writer_io(&self.year, &self.path, e))
    }

    pub(crate) fn write_fragment(&mut self, fragment: &str) -> Result<()> {
        if self.state == WriterState::Open {
            self.state = WriterState::Draining;
            tracing::trace!("{}: draining", self.year);
        }
        self.write_raw(fragment)?;
        self.write_raw("\n")?;
        self.written += 1;
        Ok(())
    }

    /// Write the footer and close the file; consumes the writer
    pub(crate) fn close(mut self, frame: &DocumentFrame) -> Result<usize> {
        self.write_raw(&frame.footer)?;
        self.out
            .flush()
            .map_err(|e| SplitError::writer_io(&self.year, &self.path, e))?;
        self.state = WriterState::Closed;
        tracing::debug!("{}: closed after {} messages", self.year, self.written);
        Ok(self.written)
    }
}

/// Drain one year's queue into its file.
///
/// On an I/O error the file is abandoned but the queue is still consumed up
/// to the sentinel, so nothing piles up behind a dead writer.
pub(crate) fn drain_year(
    year: &str,
    queue: Receiver<QueueItem>,
    frame: &DocumentFrame,
    output_dir: &Path,
) -> WriterReport {
    let path = output_dir.join(format!("{}.html", year));

    let mut written = 0usize;
    let mut saw_done = false;
    let result = YearWriter::open(output_dir, year, frame).and_then(|mut writer| {
        for item in queue.iter() {
            match item {
                QueueItem::Message(fragment) => writer.write_fragment(&fragment)?,
                QueueItem::Done => {
                    saw_done = true;
                    break;
                }
            }
        }
        if !saw_done {
            tracing::warn!("{}: queue closed without a done marker", year);
        }
        written = writer.close(frame)?;
        Ok(())
    });

    if result.is_err() && !saw_done {
        let discarded = queue
            .iter()
            .take_while(|item| *item != QueueItem::Done)
            .count();
        if discarded > 0 {
            tracing::warn!("{}: discarded {} messages after write failure", year, discarded);
        }
    }

    WriterReport {
        year: year.to_string(),
        path,
        messages_written: written,
        result,
    }
}

/// What a writer thread needs besides its channels
#[derive(Clone)]
pub(crate) struct WriterContext {
    pub router: Arc<YearRouter>,
    pub frame: Arc<DocumentFrame>,
    pub output_dir: PathBuf,
}

/// Writer thread: handles year jobs until the job channel closes
pub(crate) fn writer_thread(
    writer_id: usize,
    jobs: Receiver<String>,
    report_sender: Sender<WriterReport>,
    ctx: WriterContext,
) {
    while let Ok(year) = jobs.recv() {
        let Some(queue) = ctx.router.register_writer(&year) else {
            // Another job for this year already took the queue
            continue;
        };

        tracing::debug!("writer {} takes {}", writer_id, year);
        let report = catch_unwind(AssertUnwindSafe(|| {
            drain_year(&year, queue, &ctx.frame, &ctx.output_dir)
        }))
        .unwrap_or_else(|payload| WriterReport {
            year: year.clone(),
            path: ctx.output_dir.join(format!("{}.html", year)),
            messages_written: 0,
            result: Err(SplitError::WriterLost {
                year: year.clone(),
                message: panic_message(payload.as_ref()),
            }),
        });

        if let Err(err) = &report.result {
            tracing::error!("{}", err);
        }
        if report_sender.send(report).is_err() {
            break;
        }
    }
}

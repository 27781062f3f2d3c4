//! Pipeline driver
//!
//! Owns the read loop and the shutdown order:
//!
//! 1. capture the document frame
//! 2. read chunks, split them and submit complete batches
//! 3. submit the trailing remainder
//! 4. close the work channel and wait for every batch report
//! 5. hand every known year to the writer pool
//! 6. signal done to all year queues
//! 7. wait for the writers (bounded per writer on the error path)
//! 8. join the pool threads
//!
//! Step 6 never happens before step 4 has finished, so a writer cannot close
//! its file while a late batch still routes into it.

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError};
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::error::{Result, SplitError};
use crate::frame::DocumentFrame;
use crate::parsers::boundary::BoundarySplitter;
use crate::parsers::message::MessageExtractor;
use crate::progress::Progress;
use crate::stats::RunSummary;
use crate::timestamp::YearClassifier;

use super::batching::feed_batches;
use super::sink::{writer_thread, WriterContext};
use super::tracker::YearRouter;
use super::types::{ParallelConfig, WriterReport};
use super::worker::{worker_thread, WorkerContext};

/// Main parallel processor
pub struct ParallelProcessor {
    config: ParallelConfig,
}

impl ParallelProcessor {
    pub fn new(config: ParallelConfig) -> Self {
        Self { config }
    }

    /// Split `input` into one file per year under `output_dir`.
    ///
    /// Batch and writer failures are reported in the summary. Only input,
    /// output directory and unparseable-input errors are returned as `Err`.
    pub fn run(&self, input: &Path, output_dir: &Path) -> Result<RunSummary> {
        let started = Instant::now();
        let cfg = &self.config;

        let frame = Arc::new(DocumentFrame::capture(input, &cfg.container_class)?);
        let file = File::open(input).map_err(|source| SplitError::InputOpen {
            path: input.to_path_buf(),
            source,
        })?;
        let total_bytes = file.metadata().ok().map(|m| m.len());

        fs::create_dir_all(output_dir).map_err(|source| SplitError::OutputDir {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let classifier = YearClassifier::new()
            .map_err(|e| SplitError::Config(format!("date patterns: {}", e)))?;

        tracing::info!(
            "splitting {} into {} ({} workers, {} writers, {} byte chunks, {})",
            input.display(),
            output_dir.display(),
            cfg.num_workers,
            cfg.num_writers,
            cfg.chunk_size,
            if cfg.preserve_order { "ordered" } else { "unordered" }
        );

        // Writer pool first, so years can start draining while batches run
        let (job_sender, job_receiver) = unbounded::<String>();
        let router = Arc::new(
            YearRouter::new(cfg.preserve_order)
                .with_reorder_window(cfg.work_queue_capacity())
                .with_discovery(job_sender.clone()),
        );
        let (writer_report_sender, writer_report_receiver) = unbounded::<WriterReport>();
        let writer_ctx = WriterContext {
            router: Arc::clone(&router),
            frame: Arc::clone(&frame),
            output_dir: output_dir.to_path_buf(),
        };
        let writer_handles: Vec<JoinHandle<()>> = (0..cfg.num_writers.max(1))
            .map(|id| {
                let jobs = job_receiver.clone();
                let reports = writer_report_sender.clone();
                let ctx = writer_ctx.clone();
                thread::spawn(move || writer_thread(id, jobs, reports, ctx))
            })
            .collect();
        drop(job_receiver);
        drop(writer_report_sender);

        let (work_sender, work_receiver) = bounded(cfg.work_queue_capacity());
        let (report_sender, report_receiver) = unbounded();
        let worker_ctx = WorkerContext {
            router: Arc::clone(&router),
            extractor: MessageExtractor::new(&cfg.message_class, &cfg.timestamp_class),
            classifier: Arc::new(classifier),
            keep_unclassified: cfg.keep_unclassified,
        };
        let worker_handles: Vec<JoinHandle<()>> = (0..cfg.num_workers.max(1))
            .map(|id| {
                let work = work_receiver.clone();
                let reports = report_sender.clone();
                let ctx = worker_ctx.clone();
                thread::spawn(move || worker_thread(id, work, reports, ctx))
            })
            .collect();
        drop(work_receiver);
        drop(report_sender);

        let mut summary = RunSummary {
            input: input.display().to_string(),
            output_dir: output_dir.display().to_string(),
            unclassified_kept: cfg.keep_unclassified,
            ..Default::default()
        };
        let mut progress = Progress::new(cfg.show_progress, total_bytes);

        let splitter = BoundarySplitter::new(cfg.boundary, &cfg.message_class, cfg.max_pending);
        let feed = feed_batches(
            file,
            cfg.chunk_size,
            splitter,
            |batch| work_sender.send(batch).is_ok(),
            |bytes, pending| progress.reading(bytes, pending),
        );
        drop(work_sender);

        summary.bytes_read = feed.bytes_read;
        summary.chunks_read = feed.chunks_read;
        summary.batches_submitted = feed.batches_submitted;

        let fatal = match feed.result {
            Ok(()) => None,
            Err(err) if err.is_fatal() => {
                tracing::error!("{}, stopping after {} batches", err, feed.batches_submitted);
                Some(err)
            }
            Err(err) => {
                summary.batches_failed += 1;
                summary.batch_failures.push(err.to_string());
                None
            }
        };

        self.collect_batch_reports(&report_receiver, &mut summary, &mut progress);
        join_all("worker", worker_handles);

        for year in router.years() {
            // Duplicates of discovered years are ignored by the writers
            let _ = job_sender.send(year);
        }
        drop(job_sender);
        router.signal_done();

        let years = router.years();
        let reports = if fatal.is_none() {
            let reports = collect_writer_reports(&writer_report_receiver, years.len(), &mut progress);
            join_all("writer", writer_handles);
            reports
        } else {
            // Threads that miss the deadline are left detached
            collect_writer_reports_bounded(&writer_report_receiver, years.len(), cfg)
        };
        progress.finish();

        summary.messages_routed = router.routed_counts().values().sum();
        record_writer_reports(&mut summary, &years, reports);
        summary.elapsed = started.elapsed();

        match fatal {
            Some(err) => Err(err),
            None => {
                tracing::info!(
                    "done: {} messages in {} files",
                    summary.messages_routed,
                    summary.years.len()
                );
                Ok(summary)
            }
        }
    }

    fn collect_batch_reports(
        &self,
        receiver: &Receiver<super::types::BatchReport>,
        summary: &mut RunSummary,
        progress: &mut Progress,
    ) {
        for report in receiver.iter() {
            summary.absorb_worker_stats(&report.worker_stats);
            if let Err(err) = report.outcome {
                summary.batches_failed += 1;
                summary.batch_failures.push(err.to_string());
            }
            progress.batches(summary.batches_processed, summary.batches_submitted);
        }
        if summary.batches_processed != summary.batches_submitted {
            tracing::warn!(
                "{} batches submitted but {} reported",
                summary.batches_submitted,
                summary.batches_processed
            );
        }
    }
}

/// Wait for one report per year, without a deadline
fn collect_writer_reports(
    receiver: &Receiver<WriterReport>,
    expected: usize,
    progress: &mut Progress,
) -> Vec<WriterReport> {
    let mut reports = Vec::with_capacity(expected);
    while reports.len() < expected {
        match receiver.recv() {
            Ok(report) => {
                reports.push(report);
                progress.writers(reports.len(), expected);
            }
            Err(_) => break,
        }
    }
    reports
}

/// Error-path variant: each outstanding writer gets `writer_timeout`
fn collect_writer_reports_bounded(
    receiver: &Receiver<WriterReport>,
    expected: usize,
    cfg: &ParallelConfig,
) -> Vec<WriterReport> {
    let mut reports = Vec::with_capacity(expected);
    while reports.len() < expected {
        match receiver.recv_timeout(cfg.writer_timeout) {
            Ok(report) => reports.push(report),
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    "{} writers did not finish within {}, abandoning them",
                    expected - reports.len(),
                    humantime::format_duration(cfg.writer_timeout)
                );
                break;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    reports
}

/// Per-year counts and writer failures; a year without a report is lost
fn record_writer_reports(summary: &mut RunSummary, years: &[String], reports: Vec<WriterReport>) {
    for year in years {
        match reports.iter().find(|r| &r.year == year) {
            Some(report) => {
                summary.years.insert(year.clone(), report.messages_written);
            }
            None => {
                summary.years.insert(year.clone(), 0);
                let lost = SplitError::WriterLost {
                    year: year.clone(),
                    message: "no report before the deadline".to_string(),
                };
                summary.writer_failures.push(lost.to_string());
            }
        }
    }
    for report in reports {
        if let Err(err) = report.result {
            summary.writer_failures.push(err.to_string());
        }
    }
}

fn join_all(kind: &str, handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if let Err(payload) = handle.join() {
            tracing::error!(
                "{} thread panicked: {}",
                kind,
                crate::error::panic_message(payload.as_ref())
            );
        }
    }
}

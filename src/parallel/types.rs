//! Type definitions for parallel processing
//!
//! Contains the batch, queue and report messages passed between the driver,
//! workers and writers, plus the pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::SplitError;
use crate::parsers::boundary::BoundaryStrategy;
use crate::parsers::message::{DEFAULT_MESSAGE_CLASS, DEFAULT_TIMESTAMP_CLASS};
use crate::stats::ProcessingStats;

pub const DEFAULT_CONTAINER_CLASS: &str = "chatlog";

/// File stem of the bucket for messages without a usable date
pub const UNCLASSIFIED_BUCKET: &str = "unclassified";

const MB: usize = 1024 * 1024;

/// Configuration for parallel processing
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    pub num_workers: usize,
    pub num_writers: usize,
    /// Bytes per read
    pub chunk_size: usize,
    /// Largest remainder carried between reads
    pub max_pending: usize,
    /// Route batches in read order instead of completion order
    pub preserve_order: bool,
    pub boundary: BoundaryStrategy,
    /// Bounded join per writer on the error path
    pub writer_timeout: Duration,
    pub message_class: String,
    pub timestamp_class: String,
    pub container_class: String,
    pub keep_unclassified: bool,
    pub show_progress: bool,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            num_writers: 8,
            chunk_size: 10 * MB,
            max_pending: 256 * MB,
            preserve_order: true,
            boundary: BoundaryStrategy::default(),
            writer_timeout: Duration::from_secs(5),
            message_class: DEFAULT_MESSAGE_CLASS.to_string(),
            timestamp_class: DEFAULT_TIMESTAMP_CLASS.to_string(),
            container_class: DEFAULT_CONTAINER_CLASS.to_string(),
            keep_unclassified: false,
            show_progress: false,
        }
    }
}

impl ParallelConfig {
    /// Work channel capacity and reorder window, in batches
    pub(crate) fn work_queue_capacity(&self) -> usize {
        self.num_workers.max(1) * 2
    }
}

/// A complete fragment handed to the worker pool
#[derive(Debug, Clone)]
pub struct Batch {
    /// Read-order sequence number, starting at 0
    pub id: u64,
    pub bytes: Vec<u8>,
}

/// One classified message on its way to a year queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedMessage {
    pub year: String,
    pub markup: String,
}

/// Item in a year queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem {
    Message(String),
    /// Sentinel: nothing more will be routed to this year
    Done,
}

/// Sent by a worker after every batch
#[derive(Debug)]
pub struct BatchReport {
    pub batch_id: u64,
    /// Number of messages routed, or why the batch was skipped
    pub outcome: Result<usize, SplitError>,
    pub worker_stats: ProcessingStats,
}

/// Sent by a writer when a year file is finished or abandoned
#[derive(Debug)]
pub struct WriterReport {
    pub year: String,
    pub path: PathBuf,
    pub messages_written: usize,
    pub result: Result<(), SplitError>,
}

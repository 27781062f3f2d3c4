//! Parallel split pipeline
//!
//! # Module Structure
//!
//! - `types`: batches, queue items, reports and configuration
//! - `tracker`: the shared year router
//! - `batching`: chunked read loop feeding the boundary splitter
//! - `worker`: batch workers (extract, classify, route)
//! - `sink`: year writer threads
//! - `processor`: the driver and its shutdown sequence

mod batching;
mod processor;
mod sink;
mod tracker;
mod types;
mod worker;

pub use processor::ParallelProcessor;
pub use sink::WriterState;
pub use tracker::YearRouter;
pub use types::{
    Batch, BatchReport, ParallelConfig, QueueItem, RoutedMessage, WriterReport,
    DEFAULT_CONTAINER_CLASS, UNCLASSIFIED_BUCKET,
};

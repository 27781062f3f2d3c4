// Core library for the chatsplit HTML chat log splitter

pub mod cli;
pub mod config;
pub mod config_file;
pub mod error;
pub mod frame;
pub mod logging;
pub mod parallel;
pub mod parsers;
pub mod platform;
pub mod progress;
pub mod stats;
pub mod timestamp;
pub mod tty;

pub use config::SplitConfig;
pub use error::{Result, SplitError};
pub use frame::DocumentFrame;
pub use parallel::{ParallelConfig, ParallelProcessor};
pub use stats::RunSummary;
pub use timestamp::YearClassifier;

use std::path::Path;

/// Split `input` into `<output_dir>/<year>.html` files with `config`.
pub fn split_file(
    input: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &ParallelConfig,
) -> Result<RunSummary> {
    ParallelProcessor::new(config.clone()).run(input.as_ref(), output_dir.as_ref())
}

use std::path::PathBuf;

use crate::cli::{Cli, StatsFormat};
use crate::error::SplitError;
use crate::logging::LogLevel;
use crate::parallel::ParallelConfig;

const MB: usize = 1024 * 1024;

/// Main configuration struct for chatsplit
#[derive(Debug, Clone)]
pub struct SplitConfig {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub pipeline: ParallelConfig,
    pub output: OutputConfig,
}

/// How results are reported to the user
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub stats: Option<StatsFormat>,
    pub log_level: LogLevel,
    pub no_emoji: bool,
}

impl SplitConfig {
    /// Create configuration from CLI arguments
    pub fn from_cli(cli: &Cli) -> Result<Self, SplitError> {
        let input = cli
            .input
            .clone()
            .ok_or_else(|| SplitError::Config("--input is required".to_string()))?;

        let config = Self {
            input,
            output_dir: cli.output.clone(),
            pipeline: ParallelConfig {
                num_workers: effective_threads(cli.workers),
                num_writers: effective_threads(cli.writers),
                chunk_size: cli.chunk_size.saturating_mul(MB),
                max_pending: cli.max_pending.saturating_mul(MB),
                preserve_order: !cli.unordered,
                boundary: cli.boundary.into(),
                writer_timeout: cli.writer_timeout,
                message_class: cli.message_class.clone(),
                timestamp_class: cli.timestamp_class.clone(),
                container_class: cli.container_class.clone(),
                keep_unclassified: cli.unclassified,
                show_progress: !cli.no_progress && !cli.quiet,
            },
            output: OutputConfig {
                stats: cli.stats,
                log_level: LogLevel::from_flags(cli.quiet, cli.verbose),
                no_emoji: cli.no_emoji,
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), SplitError> {
        let p = &self.pipeline;
        if p.chunk_size == 0 {
            return Err(SplitError::Config("--chunk-size must be at least 1 MB".to_string()));
        }
        if p.max_pending < p.chunk_size {
            return Err(SplitError::Config(format!(
                "--max-pending ({} MB) must not be smaller than --chunk-size ({} MB)",
                p.max_pending / MB,
                p.chunk_size / MB
            )));
        }
        for (flag, value) in [
            ("--message-class", &p.message_class),
            ("--timestamp-class", &p.timestamp_class),
            ("--container-class", &p.container_class),
        ] {
            if value.trim().is_empty() || value.chars().any(char::is_whitespace) {
                return Err(SplitError::Config(format!(
                    "{} must be a single class name, got '{}'",
                    flag, value
                )));
            }
        }
        if self.input.as_os_str().is_empty() {
            return Err(SplitError::Config("--input must not be empty".to_string()));
        }
        Ok(())
    }
}

/// 0 means one per CPU
pub fn effective_threads(requested: usize) -> usize {
    if requested == 0 {
        num_cpus::get()
    } else {
        requested
    }
}

pub fn format_error_message(message: &str, use_emoji: bool) -> String {
    if use_emoji {
        format!("❌ {}", message)
    } else {
        format!("chatsplit: error: {}", message)
    }
}

pub fn format_warning_message(message: &str, use_emoji: bool) -> String {
    if use_emoji {
        format!("⚠️  {}", message)
    } else {
        format!("chatsplit: warning: {}", message)
    }
}

pub fn format_info_message(message: &str, use_emoji: bool) -> String {
    if use_emoji {
        format!("🔹 {}", message)
    } else {
        format!("chatsplit: {}", message)
    }
}

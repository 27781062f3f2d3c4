// Command-line interface definitions

use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use std::time::Duration;

use crate::parsers::boundary::BoundaryStrategy;

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BoundaryMode {
    /// Cut after the last `</div>` in the buffer
    #[default]
    ClosingTag,
    /// Cut before the last message-group opening tag
    GroupStart,
}

impl From<BoundaryMode> for BoundaryStrategy {
    fn from(mode: BoundaryMode) -> Self {
        match mode {
            BoundaryMode::ClosingTag => BoundaryStrategy::LastClosingTag,
            BoundaryMode::GroupStart => BoundaryStrategy::GroupStart,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatsFormat {
    Table,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "chatsplit")]
#[command(about = "Split an exported HTML chat log into one HTML file per year")]
#[command(
    long_about = "Split an exported HTML chat log into one HTML file per year\n\n\
The input is read in chunks, message groups are parsed on a worker pool and \
each message is written to <output>/<year>.html, wrapped in the original \
document header and footer.\n\n\
COMMON EXAMPLES:\n  chatsplit -i export.html\n  chatsplit -i export.html -o by-year -c 32 -w 8\n  chatsplit -i export.html --unclassified --stats=json"
)]
#[command(author = "Dirk Loss <mail@dirk-loss.de>")]
#[command(version)]
#[command(args_override_self = true)]
pub struct Cli {
    /// Exported HTML chat log to split
    #[arg(
        short = 'i',
        long = "input",
        value_name = "FILE",
        help_heading = "Input Options",
        required_unless_present_any = ["completions", "show_config"]
    )]
    pub input: Option<PathBuf>,

    /// Directory for the per-year files (created if missing)
    #[arg(
        short = 'o',
        long = "output",
        value_name = "DIR",
        default_value = "output",
        help_heading = "Output Options"
    )]
    pub output: PathBuf,

    /// Read chunk size in MB
    #[arg(
        short = 'c',
        long = "chunk-size",
        value_name = "MB",
        default_value_t = 10,
        help_heading = "Performance Options"
    )]
    pub chunk_size: usize,

    /// Number of parsing workers (0 = number of CPUs)
    #[arg(
        short = 'w',
        long = "workers",
        default_value_t = 4,
        help_heading = "Performance Options"
    )]
    pub workers: usize,

    /// Maximum number of year files written at the same time (0 = number of CPUs)
    #[arg(long = "writers", default_value_t = 8, help_heading = "Performance Options")]
    pub writers: usize,

    /// How long to wait for each writer when shutting down after an error
    #[arg(
        long = "writer-timeout",
        value_name = "DURATION",
        default_value = "5s",
        value_parser = parse_duration,
        help_heading = "Performance Options"
    )]
    pub writer_timeout: Duration,

    /// Give up when this many MB accumulate without a message boundary
    #[arg(
        long = "max-pending",
        value_name = "MB",
        default_value_t = 256,
        help_heading = "Performance Options"
    )]
    pub max_pending: usize,

    /// Write messages in completion order instead of document order
    #[arg(long = "unordered", help_heading = "Performance Options")]
    pub unordered: bool,

    /// How chunk boundaries are found
    #[arg(
        long = "boundary",
        value_enum,
        default_value = "closing-tag",
        help_heading = "Input Options"
    )]
    pub boundary: BoundaryMode,

    /// Class of the message group elements
    #[arg(
        long = "message-class",
        value_name = "CLASS",
        default_value = crate::parsers::message::DEFAULT_MESSAGE_CLASS,
        help_heading = "Input Options"
    )]
    pub message_class: String,

    /// Class of the timestamp span inside a message group
    #[arg(
        long = "timestamp-class",
        value_name = "CLASS",
        default_value = crate::parsers::message::DEFAULT_TIMESTAMP_CLASS,
        help_heading = "Input Options"
    )]
    pub timestamp_class: String,

    /// Class of the element that contains all messages
    #[arg(
        long = "container-class",
        value_name = "CLASS",
        default_value = crate::parallel::DEFAULT_CONTAINER_CLASS,
        help_heading = "Input Options"
    )]
    pub container_class: String,

    /// Write messages without a recognisable date to unclassified.html instead of dropping them
    #[arg(long = "unclassified", help_heading = "Output Options")]
    pub unclassified: bool,

    /// Print run statistics. Use -s for a table, or --stats=json
    #[arg(
        short = 's',
        long = "stats",
        value_enum,
        value_name = "FORMAT",
        require_equals = true,
        num_args = 0..=1,
        default_missing_value = "table",
        help_heading = "Output Options"
    )]
    pub stats: Option<StatsFormat>,

    /// Only print errors
    #[arg(
        short = 'q',
        long = "quiet",
        help_heading = "Output Options",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    /// More diagnostics on stderr (-v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Output Options")]
    pub verbose: u8,

    /// Disable emoji prefixes
    #[arg(long = "no-emoji", help_heading = "Display Options")]
    pub no_emoji: bool,

    /// Do not draw the progress line
    #[arg(long = "no-progress", help_heading = "Display Options")]
    pub no_progress: bool,

    /// Specify custom configuration file path
    #[arg(long = "config-file", value_name = "FILE", help_heading = "Configuration Options")]
    pub config_file: Option<String>,

    /// Ignore configuration files
    #[arg(long = "ignore-config", help_heading = "Configuration Options")]
    pub ignore_config: bool,

    /// Use alias from configuration file
    #[arg(short = 'a', long = "alias", help_heading = "Configuration Options")]
    pub alias: Vec<String>,

    /// Show configuration file and exit
    #[arg(long = "show-config", help_heading = "Configuration Options")]
    pub show_config: bool,

    /// Print a shell completion script and exit
    #[arg(
        long = "completions",
        value_enum,
        value_name = "SHELL",
        help_heading = "Configuration Options"
    )]
    pub completions: Option<clap_complete::Shell>,
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value).map_err(|e| format!("invalid duration '{}': {}", value, e))
}

/// Write the completion script for `shell` to stdout
pub fn print_completions(shell: clap_complete::Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
}

use anyhow::Result;
use clap::{error::ErrorKind, Parser};
use std::io::Write;

use chatsplit::cli::{print_completions, Cli, StatsFormat};
use chatsplit::config::{
    format_error_message, format_info_message, format_warning_message, SplitConfig,
};
use chatsplit::config_file::ConfigFile;
use chatsplit::logging::init_logging;
use chatsplit::platform::{ExitCode, SafeStderr, SafeStdout};
use chatsplit::stats::RunSummary;
use chatsplit::tty::should_use_emoji;
use chatsplit::ParallelProcessor;

/// Failures listed individually before the rest are summarised
const MAX_LISTED_FAILURES: usize = 5;

fn main() {
    let mut stderr = SafeStderr::new();
    let raw_args: Vec<String> = std::env::args().collect();
    let early_emoji = should_use_emoji(raw_args.iter().any(|arg| arg == "--no-emoji"));

    // --show-config runs before any config file is applied
    if raw_args.iter().any(|arg| arg == "--show-config") {
        ConfigFile::show_config();
        ExitCode::Success.exit();
    }

    let args = match process_args_with_config(raw_args) {
        Ok(args) => args,
        Err(e) => {
            stderr.writeln(&format_error_message(
                &format!("config: {:#}", e),
                early_emoji,
            ));
            ExitCode::GeneralError.exit();
        }
    };

    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => {
                let _ = e.print();
                ExitCode::InvalidUsage.exit();
            }
        },
    };

    if let Some(shell) = cli.completions {
        print_completions(shell);
        ExitCode::Success.exit();
    }

    let use_emoji = should_use_emoji(cli.no_emoji);
    let config = match SplitConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            stderr.writeln(&format_error_message(&e.to_string(), use_emoji));
            ExitCode::for_error(&e).exit();
        }
    };

    init_logging(config.output.log_level);
    tracing::debug!("configuration: {:?}", config);

    let processor = ParallelProcessor::new(config.pipeline.clone());
    let summary = match processor.run(&config.input, &config.output_dir) {
        Ok(summary) => summary,
        Err(e) => {
            stderr.writeln(&format_error_message(&e.to_string(), use_emoji));
            ExitCode::for_error(&e).exit();
        }
    };

    report(&summary, &config, &cli, use_emoji, &mut stderr);
    ExitCode::Success.exit();
}

/// Apply config file defaults and aliases unless `--ignore-config` is given
fn process_args_with_config(raw_args: Vec<String>) -> Result<Vec<String>> {
    if raw_args.iter().any(|arg| arg == "--ignore-config") {
        return Ok(raw_args);
    }
    let config_file_path = extract_config_file_arg(&raw_args);
    let config_file = ConfigFile::load_with_custom_path(config_file_path.as_deref())?;
    config_file.process_args(raw_args)
}

fn extract_config_file_arg(args: &[String]) -> Option<String> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config-file" {
            return iter.next().cloned();
        }
        if let Some(path) = arg.strip_prefix("--config-file=") {
            return Some(path.to_string());
        }
    }
    None
}

fn report(
    summary: &RunSummary,
    config: &SplitConfig,
    cli: &Cli,
    use_emoji: bool,
    stderr: &mut SafeStderr,
) {
    if !cli.quiet {
        stderr.writeln(&format_info_message(
            &format!(
                "wrote {} messages to {} files in {}",
                summary.messages_routed,
                summary.years.len(),
                config.output_dir.display()
            ),
            use_emoji,
        ));
    }

    let dropped = summary.dropped();
    if dropped > 0 {
        stderr.writeln(&format_warning_message(
            &format!(
                "{} messages had no recognisable date and were dropped ({} without timestamp, {} unmatched); use --unclassified to keep them",
                dropped, summary.missing_timestamp, summary.unmatched_date
            ),
            use_emoji,
        ));
    }

    if summary.has_failures() {
        let failures: Vec<&String> = summary
            .batch_failures
            .iter()
            .chain(summary.writer_failures.iter())
            .collect();
        stderr.writeln(&format_warning_message(
            &format!("{} failures during the run:", failures.len()),
            use_emoji,
        ));
        for failure in failures.iter().take(MAX_LISTED_FAILURES) {
            stderr.writeln(&format!("  {}", failure));
        }
        if failures.len() > MAX_LISTED_FAILURES {
            stderr.writeln(&format!("  ... and {} more", failures.len() - MAX_LISTED_FAILURES));
        }
    }

    match config.output.stats {
        Some(StatsFormat::Table) => stderr.writeln(&summary.format_stats()),
        Some(StatsFormat::Json) => {
            if let Err(message) = emit_json_summary(summary, &mut SafeStdout::new()) {
                stderr.writeln(&format_error_message(&message, use_emoji));
            }
        }
        None => {}
    }
}

/// Print the JSON summary; a failure comes back as a user-facing message
fn emit_json_summary<W: Write>(
    summary: &RunSummary,
    out: &mut SafeStdout<W>,
) -> Result<(), String> {
    let json = summary
        .to_json()
        .map_err(|e| format!("cannot serialize run summary: {}", e))?;
    out.writeln(&json)
        .map_err(|e| format!("cannot write run summary: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extract_config_file_arg() {
        assert_eq!(
            extract_config_file_arg(&args(&["chatsplit", "--config-file", "a.ini", "-i", "x"])),
            Some("a.ini".to_string())
        );
        assert_eq!(
            extract_config_file_arg(&args(&["chatsplit", "--config-file=b.ini"])),
            Some("b.ini".to_string())
        );
        assert_eq!(extract_config_file_arg(&args(&["chatsplit", "-i", "x"])), None);
    }

    #[test]
    fn test_ignore_config_passes_args_through() {
        let raw = args(&["chatsplit", "--ignore-config", "-a", "whatever"]);
        assert_eq!(process_args_with_config(raw.clone()).unwrap(), raw);
    }

    struct ClosedFile;

    impl Write for ClosedFile {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "bad file descriptor"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_json_summary_write_failure_is_reported() {
        let summary = RunSummary::default();
        let mut out = SafeStdout::with_writer(ClosedFile);
        let message = emit_json_summary(&summary, &mut out).unwrap_err();
        assert!(message.starts_with("cannot write run summary"), "{}", message);
        assert!(message.contains("bad file descriptor"));
    }

    #[test]
    fn test_json_summary_is_written() {
        let mut summary = RunSummary::default();
        summary.years.insert("2021".to_string(), 2);
        let mut out = SafeStdout::with_writer(Vec::new());
        emit_json_summary(&summary, &mut out).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out.into_inner()).unwrap();
        assert_eq!(json["years"]["2021"], 2);
    }
}

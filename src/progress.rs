//! Progress bar on stderr
//!
//! One bar moves through three phases: bytes read, batches parsed and year
//! files written. Nothing is drawn unless progress was requested and stderr
//! is a terminal; indicatif does the terminal check and the redraw throttling.

use indicatif::{HumanBytes, ProgressBar, ProgressDrawTarget, ProgressStyle};

const REDRAW_HZ: u8 = 8;

const READING_TEMPLATE: &str =
    "{spinner} reading  [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}";
const STREAM_TEMPLATE: &str = "{spinner} reading  {bytes} ({bytes_per_sec}) {msg}";
const BATCHES_TEMPLATE: &str = "{spinner} parsing  [{bar:30}] {pos}/{len} batches";
const WRITERS_TEMPLATE: &str = "{spinner} writing  [{bar:30}] {pos}/{len} year files";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Reading,
    Batches,
    Writers,
}

pub struct Progress {
    bar: ProgressBar,
    phase: Phase,
}

impl Progress {
    pub fn new(enabled: bool, total_bytes: Option<u64>) -> Self {
        if !enabled {
            return Self {
                bar: ProgressBar::hidden(),
                phase: Phase::Reading,
            };
        }

        let bar = match total_bytes {
            Some(total) => {
                let bar = ProgressBar::new(total);
                bar.set_style(style(READING_TEMPLATE));
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(style(STREAM_TEMPLATE));
                bar
            }
        };
        bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(REDRAW_HZ));
        Self {
            bar,
            phase: Phase::Reading,
        }
    }

    pub fn reading(&mut self, bytes_read: u64, pending: usize) {
        self.bar.set_position(bytes_read);
        self.bar
            .set_message(format!("{} pending", HumanBytes(pending as u64)));
    }

    pub fn batches(&mut self, done: usize, submitted: usize) {
        self.enter(Phase::Batches, BATCHES_TEMPLATE, submitted);
        self.bar.set_position(done as u64);
    }

    pub fn writers(&mut self, done: usize, total: usize) {
        self.enter(Phase::Writers, WRITERS_TEMPLATE, total);
        self.bar.set_position(done as u64);
    }

    /// Erase the bar
    pub fn finish(&mut self) {
        self.bar.finish_and_clear();
    }

    fn enter(&mut self, phase: Phase, template: &str, len: usize) {
        if self.phase != phase {
            self.phase = phase;
            self.bar.set_style(style(template));
            self.bar.set_message("");
        }
        self.bar.set_length(len as u64);
    }
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_parse() {
        for template in [
            READING_TEMPLATE,
            STREAM_TEMPLATE,
            BATCHES_TEMPLATE,
            WRITERS_TEMPLATE,
        ] {
            assert!(ProgressStyle::with_template(template).is_ok(), "{}", template);
        }
    }

    #[test]
    fn test_disabled_progress_is_hidden() {
        let mut progress = Progress::new(false, Some(100));
        assert!(progress.bar.is_hidden());
        progress.reading(40, 0);
        assert_eq!(progress.bar.position(), 40);
    }

    #[test]
    fn test_phases_reset_length_and_position() {
        let mut progress = Progress::new(false, None);
        progress.reading(1024, 512);

        progress.batches(3, 10);
        assert_eq!(progress.phase, Phase::Batches);
        assert_eq!(progress.bar.length(), Some(10));
        assert_eq!(progress.bar.position(), 3);

        progress.writers(1, 4);
        assert_eq!(progress.phase, Phase::Writers);
        assert_eq!(progress.bar.length(), Some(4));
        assert_eq!(progress.bar.position(), 1);

        progress.finish();
        assert!(progress.bar.is_finished());
    }
}

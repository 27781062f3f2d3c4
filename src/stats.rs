use indexmap::IndexMap;
use serde::Serialize;
use std::cell::RefCell;
use std::time::{Duration, Instant};

/// Counters collected by one worker thread
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingStats {
    pub batches_processed: usize,
    pub messages_extracted: usize,
    pub messages_classified: usize,
    pub missing_timestamp: usize,
    pub unmatched_date: usize,
    pub errors: usize,
    pub processing_time: Duration,
}

// Per-thread counters; workers take a snapshot after every batch
thread_local! {
    static THREAD_STATS: RefCell<ProcessingStats> = RefCell::new(ProcessingStats::default());
    static BATCH_START: RefCell<Option<Instant>> = const { RefCell::new(None) };
}

pub fn stats_add_batch() {
    THREAD_STATS.with(|stats| {
        stats.borrow_mut().batches_processed += 1;
    });
}

pub fn stats_add_message_extracted() {
    THREAD_STATS.with(|stats| {
        stats.borrow_mut().messages_extracted += 1;
    });
}

pub fn stats_add_message_classified() {
    THREAD_STATS.with(|stats| {
        stats.borrow_mut().messages_classified += 1;
    });
}

pub fn stats_add_missing_timestamp() {
    THREAD_STATS.with(|stats| {
        stats.borrow_mut().missing_timestamp += 1;
    });
}

pub fn stats_add_unmatched_date() {
    THREAD_STATS.with(|stats| {
        stats.borrow_mut().unmatched_date += 1;
    });
}

pub fn stats_add_error() {
    THREAD_STATS.with(|stats| {
        stats.borrow_mut().errors += 1;
    });
}

pub fn stats_start_timer() {
    BATCH_START.with(|start| {
        *start.borrow_mut() = Some(Instant::now());
    });
}

/// Return this thread's counters and reset them
pub fn take_thread_stats() -> ProcessingStats {
    let elapsed = BATCH_START.with(|start| start.borrow_mut().take().map(|s| s.elapsed()));
    THREAD_STATS.with(|stats| {
        let mut taken = std::mem::take(&mut *stats.borrow_mut());
        if let Some(elapsed) = elapsed {
            taken.processing_time += elapsed;
        }
        taken
    })
}

/// Everything a run reports once it is over
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub input: String,
    pub output_dir: String,
    pub bytes_read: u64,
    pub chunks_read: usize,
    pub batches_submitted: usize,
    /// Batches a worker reported back on, failed or not
    pub batches_processed: usize,
    pub batches_failed: usize,
    /// Batches a worker gave up on (bad UTF-8 or a panic)
    pub worker_errors: usize,
    pub messages_extracted: usize,
    /// Messages that got a year from their timestamp
    pub messages_classified: usize,
    pub messages_routed: usize,
    pub missing_timestamp: usize,
    pub unmatched_date: usize,
    /// Whether unclassifiable messages went to `unclassified.html`
    pub unclassified_kept: bool,
    /// Messages written per output file stem, in discovery order
    pub years: IndexMap<String, usize>,
    pub batch_failures: Vec<String>,
    pub writer_failures: Vec<String>,
    #[serde(serialize_with = "serialize_millis", rename = "elapsed_ms")]
    pub elapsed: Duration,
    #[serde(skip)]
    pub worker_time: Duration,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl RunSummary {
    pub fn absorb_worker_stats(&mut self, stats: &ProcessingStats) {
        self.batches_processed += stats.batches_processed;
        self.worker_errors += stats.errors;
        self.messages_extracted += stats.messages_extracted;
        self.messages_classified += stats.messages_classified;
        self.missing_timestamp += stats.missing_timestamp;
        self.unmatched_date += stats.unmatched_date;
        self.worker_time += stats.processing_time;
    }

    /// Messages that ended up in no output file
    pub fn dropped(&self) -> usize {
        if self.unclassified_kept {
            0
        } else {
            self.missing_timestamp + self.unmatched_date
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.batch_failures.is_empty() || !self.writer_failures.is_empty()
    }

    pub fn format_stats(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "Input: {} bytes in {} chunks, {} batches",
            self.bytes_read, self.chunks_read, self.batches_submitted
        ));
        if self.batches_failed > 0 {
            output.push_str(&format!(" ({} failed)", self.batches_failed));
        }
        output.push('\n');

        output.push_str(&format!(
            "Messages: {} extracted, {} classified, {} routed",
            self.messages_extracted, self.messages_classified, self.messages_routed
        ));
        if self.missing_timestamp > 0 || self.unmatched_date > 0 {
            output.push_str(&format!(
                ", {} without timestamp, {} with unrecognised date",
                self.missing_timestamp, self.unmatched_date
            ));
        }
        output.push('\n');

        if !self.years.is_empty() {
            let mut years: Vec<_> = self.years.iter().collect();
            years.sort_by(|a, b| a.0.cmp(b.0));
            let width = years.iter().map(|(y, _)| y.len()).max().unwrap_or(4);
            for (year, count) in years {
                output.push_str(&format!("  {:<width$}  {}\n", year, count, width = width));
            }
        }

        if !self.writer_failures.is_empty() {
            output.push_str(&format!("Writer failures: {}\n", self.writer_failures.len()));
        }

        let elapsed_ms = self.elapsed.as_millis();
        output.push_str(&format!("Output: {} in {}ms", self.output_dir, elapsed_ms));
        if elapsed_ms > 0 && self.bytes_read > 0 {
            let mb_per_sec = (self.bytes_read as f64 / (1024.0 * 1024.0)) / self.elapsed.as_secs_f64();
            output.push_str(&format!(" ({:.1} MB/s)", mb_per_sec));
        }

        output
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

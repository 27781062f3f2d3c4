//! Worker thread for parallel processing
//!
//! Each worker takes one batch at a time, extracts and classifies its
//! messages and hands the result to the router in a single call.

use crossbeam_channel::{Receiver, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::{panic_message, Result, SplitError};
use crate::parsers::message::MessageExtractor;
use crate::stats::{
    stats_add_batch, stats_add_error, stats_add_message_classified, stats_add_message_extracted,
    stats_add_missing_timestamp, stats_add_unmatched_date, stats_start_timer, take_thread_stats,
};
use crate::timestamp::{Classification, YearClassifier};

use super::tracker::YearRouter;
use super::types::{Batch, BatchReport, RoutedMessage, UNCLASSIFIED_BUCKET};

/// What a worker needs besides its channels
#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub router: Arc<YearRouter>,
    pub extractor: MessageExtractor,
    pub classifier: Arc<YearClassifier>,
    pub keep_unclassified: bool,
}

/// Worker thread: processes batches until the work channel closes
pub(crate) fn worker_thread(
    worker_id: usize,
    work_receiver: Receiver<Batch>,
    report_sender: Sender<BatchReport>,
    ctx: WorkerContext,
) {
    tracing::debug!("worker {} started", worker_id);

    while let Ok(batch) = work_receiver.recv() {
        let batch_id = batch.id;
        let report = run_batch(&ctx.router, batch_id, || classify_batch(&ctx, &batch));
        if report_sender.send(report).is_err() {
            tracing::warn!("worker {}: driver stopped listening after batch {}", worker_id, batch_id);
            break;
        }
    }

    tracing::debug!("worker {} finished", worker_id);
}

/// Run one batch with panic isolation and route its messages.
///
/// On success all messages are routed in one call. On error or panic
/// nothing is routed and the batch's sequence slot is released.
pub(crate) fn run_batch<F>(router: &YearRouter, batch_id: u64, process: F) -> BatchReport
where
    F: FnOnce() -> Result<Vec<RoutedMessage>>,
{
    stats_start_timer();
    stats_add_batch();

    let outcome = match catch_unwind(AssertUnwindSafe(process)) {
        Ok(Ok(messages)) => {
            let count = messages.len();
            router.route_batch(batch_id, messages);
            Ok(count)
        }
        Ok(Err(err)) => {
            router.route_batch(batch_id, Vec::new());
            Err(err)
        }
        Err(payload) => {
            router.route_batch(batch_id, Vec::new());
            Err(SplitError::WorkerPanic {
                batch: batch_id,
                message: panic_message(payload.as_ref()),
            })
        }
    };

    match &outcome {
        Ok(count) => tracing::debug!("batch {}: routed {} messages", batch_id, count),
        Err(err) => {
            stats_add_error();
            tracing::error!("{}", err);
        }
    }

    BatchReport {
        batch_id,
        outcome,
        worker_stats: take_thread_stats(),
    }
}

/// Extract and classify every message in a batch without routing anything
pub(crate) fn classify_batch(ctx: &WorkerContext, batch: &Batch) -> Result<Vec<RoutedMessage>> {
    let messages = ctx.extractor.extract_bytes(batch.id, &batch.bytes)?;

    let mut routed = Vec::new();
    for message in messages {
        stats_add_message_extracted();
        let year = match ctx.classifier.classify_timestamp(message.timestamp.as_ref()) {
            Classification::Year(year) => {
                stats_add_message_classified();
                year
            }
            Classification::NoTimestamp => {
                stats_add_missing_timestamp();
                tracing::trace!("batch {}: message without timestamp", batch.id);
                if !ctx.keep_unclassified {
                    continue;
                }
                UNCLASSIFIED_BUCKET.to_string()
            }
            Classification::Unmatched => {
                stats_add_unmatched_date();
                if let Some(ts) = &message.timestamp {
                    tracing::debug!("batch {}: unrecognised date {:?}", batch.id, ts.text);
                }
                if !ctx.keep_unclassified {
                    continue;
                }
                UNCLASSIFIED_BUCKET.to_string()
            }
        };
        routed.push(RoutedMessage {
            year,
            markup: message.markup,
        });
    }

    Ok(routed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::types::QueueItem;
    use crossbeam_channel::{bounded, unbounded};
    use std::thread;

    fn context(keep_unclassified: bool) -> WorkerContext {
        WorkerContext {
            router: Arc::new(YearRouter::new(true)),
            extractor: MessageExtractor::default(),
            classifier: Arc::new(YearClassifier::new().unwrap()),
            keep_unclassified,
        }
    }

    fn group(ts: Option<&str>, body: &str) -> String {
        let ts = ts
            .map(|t| format!("<span class=\"chatlog__timestamp\">{}</span>", t))
            .unwrap_or_default();
        format!(
            "<div class=\"chatlog__message-group\">{}<div>{}</div></div>",
            ts, body
        )
    }

    fn batch(id: u64, html: &str) -> Batch {
        Batch {
            id,
            bytes: html.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_classify_batch_drops_unclassifiable_by_default() {
        let ctx = context(false);
        let html = [
            group(Some("01-Jan-21"), "a"),
            group(None, "b"),
            group(Some("whenever"), "c"),
            group(Some("05/06/2022"), "d"),
        ]
        .concat();

        let routed = classify_batch(&ctx, &batch(0, &html)).unwrap();
        let years: Vec<_> = routed.iter().map(|m| m.year.as_str()).collect();
        assert_eq!(years, vec!["2021", "2022"]);

        let stats = take_thread_stats();
        assert_eq!(stats.messages_extracted, 4);
        assert_eq!(stats.missing_timestamp, 1);
        assert_eq!(stats.unmatched_date, 1);
    }

    #[test]
    fn test_classify_batch_keeps_unclassified_bucket() {
        let ctx = context(true);
        let html = [group(None, "b"), group(Some("whenever"), "c")].concat();
        let routed = classify_batch(&ctx, &batch(0, &html)).unwrap();
        assert_eq!(routed.len(), 2);
        assert!(routed.iter().all(|m| m.year == UNCLASSIFIED_BUCKET));
    }

    #[test]
    fn test_panicking_batch_is_isolated() {
        let router = YearRouter::new(true);
        let rx = router.register_writer("2021").unwrap();

        let report = run_batch(&router, 0, || panic!("extractor blew up"));
        match report.outcome {
            Err(SplitError::WorkerPanic { batch, message }) => {
                assert_eq!(batch, 0);
                assert!(message.contains("extractor blew up"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        // Slot 0 was released, so batch 1 goes straight through
        let report = run_batch(&router, 1, || {
            Ok(vec![RoutedMessage {
                year: "2021".to_string(),
                markup: "<div>ok</div>".to_string(),
            }])
        });
        assert_eq!(report.outcome.unwrap(), 1);
        assert_eq!(
            rx.try_recv().unwrap(),
            QueueItem::Message("<div>ok</div>".to_string())
        );
    }

    #[test]
    fn test_invalid_utf8_batch_reports_and_continues() {
        let ctx = context(false);
        let bad = Batch {
            id: 0,
            bytes: b"<div class=\"chatlog__message-group\">\xff</div>".to_vec(),
        };
        let good = batch(1, &group(Some("09-Sep-19"), "fine"));

        let (work_tx, work_rx) = bounded(4);
        let (report_tx, report_rx) = unbounded();
        work_tx.send(bad).unwrap();
        work_tx.send(good).unwrap();
        drop(work_tx);

        let worker_ctx = ctx.clone();
        thread::spawn(move || worker_thread(0, work_rx, report_tx, worker_ctx))
            .join()
            .unwrap();

        let reports: Vec<_> = report_rx.iter().collect();
        assert_eq!(reports.len(), 2);
        assert!(matches!(
            reports[0].outcome,
            Err(SplitError::InvalidUtf8 { batch: 0, .. })
        ));
        assert_eq!(reports[1].outcome.as_ref().unwrap(), &1);
        assert_eq!(ctx.router.routed_counts()["2019"], 1);
    }
}

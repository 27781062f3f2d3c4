//! Read loop: chunks in, batches out
//!
//! The driver thread is the only reader of the input and the only owner of
//! the pending buffer. Every complete prefix the splitter finds becomes one
//! batch with the next sequence number.

use std::io::{self, Read};

use crate::error::{Result, SplitError};
use crate::parsers::boundary::BoundarySplitter;

use super::types::Batch;

/// Reads fixed-size chunks, retrying short reads until the chunk is full
pub(crate) struct ChunkReader<R> {
    reader: R,
    buf: Vec<u8>,
    chunk_size: usize,
}

impl<R: Read> ChunkReader<R> {
    pub(crate) fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(chunk_size),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Next chunk, or `None` at end of input. Only the last chunk may be short.
    pub(crate) fn next_chunk(&mut self) -> io::Result<Option<&[u8]>> {
        self.buf.clear();
        self.buf.resize(self.chunk_size, 0);

        let mut filled = 0;
        while filled < self.chunk_size {
            match self.reader.read(&mut self.buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        self.buf.truncate(filled);

        if filled == 0 {
            Ok(None)
        } else {
            Ok(Some(&self.buf))
        }
    }
}

/// Counters from the read loop; valid even when the loop failed
#[derive(Debug)]
pub(crate) struct FeedOutcome {
    pub bytes_read: u64,
    pub chunks_read: usize,
    pub batches_submitted: usize,
    pub result: Result<()>,
}

/// Read `reader` to the end and submit every complete fragment.
///
/// `submit` returns `false` once the worker pool is gone. The trailing
/// remainder is submitted as a last batch, complete or not.
pub(crate) fn feed_batches<R, S, P>(
    reader: R,
    chunk_size: usize,
    mut splitter: BoundarySplitter,
    mut submit: S,
    mut on_progress: P,
) -> FeedOutcome
where
    R: Read,
    S: FnMut(Batch) -> bool,
    P: FnMut(u64, usize),
{
    let mut chunks = ChunkReader::new(reader, chunk_size);
    let mut outcome = FeedOutcome {
        bytes_read: 0,
        chunks_read: 0,
        batches_submitted: 0,
        result: Ok(()),
    };
    let mut next_id = 0u64;

    let mut send = |bytes: Vec<u8>, outcome: &mut FeedOutcome| -> Result<()> {
        let batch = Batch { id: next_id, bytes };
        tracing::trace!("submitting batch {} ({} bytes)", batch.id, batch.bytes.len());
        if !submit(batch) {
            return Err(SplitError::WorkerPanic {
                batch: next_id,
                message: "worker pool stopped accepting batches".to_string(),
            });
        }
        next_id += 1;
        outcome.batches_submitted += 1;
        Ok(())
    };

    loop {
        let chunk = match chunks.next_chunk() {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                outcome.result = Err(SplitError::InputRead(e));
                return outcome;
            }
        };
        outcome.bytes_read += chunk.len() as u64;
        outcome.chunks_read += 1;

        let complete = match splitter.push(chunk) {
            Ok(complete) => complete,
            Err(e) => {
                outcome.result = Err(e);
                return outcome;
            }
        };
        if let Some(complete) = complete {
            if let Err(e) = send(complete, &mut outcome) {
                outcome.result = Err(e);
                return outcome;
            }
        }
        on_progress(outcome.bytes_read, splitter.pending_len());
    }

    if let Some(rest) = splitter.finish() {
        tracing::debug!("end of input, submitting {} trailing bytes", rest.len());
        if let Err(e) = send(rest, &mut outcome) {
            outcome.result = Err(e);
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::boundary::BoundaryStrategy;

    /// Reader that hands out at most `step` bytes per call
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    fn splitter(max_pending: usize) -> BoundarySplitter {
        BoundarySplitter::new(BoundaryStrategy::LastClosingTag, "g", max_pending)
    }

    #[test]
    fn test_chunk_reader_fills_chunks_across_short_reads() {
        let data = b"abcdefghij";
        let mut reader = ChunkReader::new(Trickle { data, step: 3 }, 4);
        assert_eq!(reader.next_chunk().unwrap(), Some(&b"abcd"[..]));
        assert_eq!(reader.next_chunk().unwrap(), Some(&b"efgh"[..]));
        assert_eq!(reader.next_chunk().unwrap(), Some(&b"ij"[..]));
        assert_eq!(reader.next_chunk().unwrap(), None);
    }

    #[test]
    fn test_feed_assigns_sequential_ids_and_keeps_all_bytes() {
        let input = b"<div>1</div><div>2</div><div>3</div><div>tail";
        let mut batches = Vec::new();
        let outcome = feed_batches(
            &input[..],
            10,
            splitter(1024),
            |batch| {
                batches.push(batch);
                true
            },
            |_, _| {},
        );

        assert!(outcome.result.is_ok());
        assert_eq!(outcome.bytes_read, input.len() as u64);
        assert_eq!(outcome.chunks_read, 5);
        assert_eq!(outcome.batches_submitted, batches.len());

        let ids: Vec<u64> = batches.iter().map(|b| b.id).collect();
        let expected: Vec<u64> = (0..batches.len() as u64).collect();
        assert_eq!(ids, expected);

        let joined: Vec<u8> = batches.iter().flat_map(|b| b.bytes.clone()).collect();
        assert_eq!(joined, input.to_vec());
        assert!(batches.last().unwrap().bytes.ends_with(b"<div>tail"));
    }

    #[test]
    fn test_feed_fails_fast_without_boundary() {
        let input = vec![b'x'; 64];
        let outcome = feed_batches(&input[..], 8, splitter(16), |_| true, |_, _| {});
        assert!(matches!(
            outcome.result,
            Err(SplitError::UnparseableInput { limit: 16 })
        ));
        assert_eq!(outcome.batches_submitted, 0);
        assert_eq!(outcome.chunks_read, 3);
    }

    #[test]
    fn test_feed_stops_when_pool_is_gone() {
        let input = b"<div>1</div><div>2</div>";
        let outcome = feed_batches(&input[..], 12, splitter(1024), |_| false, |_, _| {});
        assert!(matches!(outcome.result, Err(SplitError::WorkerPanic { batch: 0, .. })));
    }

    #[test]
    fn test_empty_input_submits_nothing() {
        let outcome = feed_batches(&b""[..], 8, splitter(16), |_| true, |_, _| {});
        assert!(outcome.result.is_ok());
        assert_eq!(outcome.batches_submitted, 0);
        assert_eq!(outcome.chunks_read, 0);
    }
}

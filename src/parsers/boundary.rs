//! Chunk boundary repair
//!
//! The driver appends every chunk it reads to a pending buffer and asks the
//! splitter for the longest prefix that ends on a message boundary. That
//! prefix becomes a batch; the rest waits for the next chunk.
//!
//! The default strategy is textual: the cut goes right after the rightmost
//! `</div>`. It can land inside a message group when groups contain nested
//! divs, which is why [`BoundaryStrategy::GroupStart`] exists.

use memchr::memmem;

use crate::error::{Result, SplitError};

pub const CLOSING_DIV: &[u8] = b"</div>";

/// Where a complete prefix ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundaryStrategy {
    /// Cut after the rightmost `</div>` in the buffer
    #[default]
    LastClosingTag,
    /// Cut before the rightmost message-group opening tag
    GroupStart,
}

/// Split `buf` after its rightmost closing div tag.
///
/// Returns `(complete, remainder)` with `complete ++ remainder == buf`.
/// Without a closing tag everything is remainder.
pub fn split_complete(buf: &[u8]) -> (&[u8], &[u8]) {
    match memmem::rfind(buf, CLOSING_DIV) {
        Some(pos) => buf.split_at(pos + CLOSING_DIV.len()),
        None => buf.split_at(0),
    }
}

/// Split `buf` right before the rightmost occurrence of `group_open`.
///
/// A marker at offset 0 means the buffer holds one unfinished group, so
/// nothing is complete yet.
pub fn split_before_group<'a>(buf: &'a [u8], group_open: &[u8]) -> (&'a [u8], &'a [u8]) {
    match memmem::rfind(buf, group_open) {
        Some(pos) => buf.split_at(pos),
        None => buf.split_at(0),
    }
}

/// Owns the pending buffer between chunk reads
#[derive(Debug)]
pub struct BoundarySplitter {
    pending: Vec<u8>,
    strategy: BoundaryStrategy,
    group_open: Vec<u8>,
    max_pending: usize,
}

impl BoundarySplitter {
    pub fn new(strategy: BoundaryStrategy, message_class: &str, max_pending: usize) -> Self {
        Self {
            pending: Vec::new(),
            strategy,
            group_open: group_open_marker(message_class).into_bytes(),
            max_pending,
        }
    }

    /// Bytes currently carried over to the next chunk
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn cut_point(&self) -> usize {
        let (complete, _) = match self.strategy {
            BoundaryStrategy::LastClosingTag => split_complete(&self.pending),
            BoundaryStrategy::GroupStart => split_before_group(&self.pending, &self.group_open),
        };
        complete.len()
    }

    /// Append a chunk and take out everything up to the boundary.
    ///
    /// Returns `Ok(None)` when no boundary is in the buffer yet. Fails with
    /// [`SplitError::UnparseableInput`] once the carried remainder is larger
    /// than the configured bound.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Option<Vec<u8>>> {
        self.pending.extend_from_slice(chunk);

        let cut = self.cut_point();
        let complete = if cut > 0 {
            let remainder = self.pending.split_off(cut);
            Some(std::mem::replace(&mut self.pending, remainder))
        } else {
            None
        };

        if self.pending.len() > self.max_pending {
            return Err(SplitError::UnparseableInput {
                limit: self.max_pending,
            });
        }

        Ok(complete)
    }

    /// End of input: whatever is left is handed over as-is, complete or not
    pub fn finish(self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending)
        }
    }
}

/// Opening-tag prefix that starts a message group
pub fn group_open_marker(message_class: &str) -> String {
    format!("<div class=\"{}\"", message_class)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const GROUP: &str = "chatlog__message-group";

    #[test]
    fn test_split_after_last_closing_tag() {
        let buf = b"<div>a</div><div>b</div><div>partial";
        let (complete, rest) = split_complete(buf);
        assert_eq!(complete, b"<div>a</div><div>b</div>");
        assert_eq!(rest, b"<div>partial");
    }

    #[test]
    fn test_no_closing_tag_keeps_everything_pending() {
        let (complete, rest) = split_complete(b"<div>still open");
        assert!(complete.is_empty());
        assert_eq!(rest, b"<div>still open");
    }

    #[test]
    fn test_closing_tag_at_start_is_a_boundary() {
        let (complete, rest) = split_complete(b"</div>tail");
        assert_eq!(complete, b"</div>");
        assert_eq!(rest, b"tail");
    }

    #[test]
    fn test_split_before_group() {
        let marker = group_open_marker(GROUP);
        let buf = format!(
            "<div class=\"{g}\"><div>x</div></div><div class=\"{g}\"><div>y</div>",
            g = GROUP
        );
        let (complete, rest) = split_before_group(buf.as_bytes(), marker.as_bytes());
        assert_eq!(
            complete,
            format!("<div class=\"{}\"><div>x</div></div>", GROUP).as_bytes()
        );
        assert!(rest.starts_with(marker.as_bytes()));
    }

    #[test]
    fn test_splitter_reassembles_message_across_small_chunks() {
        let message = format!(
            "<div class=\"{}\"><span class=\"chatlog__timestamp\">15-Jan-23</span>hello</div>",
            GROUP
        );
        let mut splitter = BoundarySplitter::new(BoundaryStrategy::LastClosingTag, GROUP, 1 << 20);

        let mut emitted = Vec::new();
        for chunk in message.as_bytes().chunks(7) {
            if let Some(complete) = splitter.push(chunk).unwrap() {
                emitted.push(complete);
            }
        }
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0], message.as_bytes());
        assert!(splitter.finish().is_none());
    }

    #[test]
    fn test_finish_returns_trailing_remainder() {
        let mut splitter = BoundarySplitter::new(BoundaryStrategy::LastClosingTag, GROUP, 1024);
        let out = splitter.push(b"<div>a</div><div>tail").unwrap();
        assert_eq!(out.as_deref(), Some(&b"<div>a</div>"[..]));
        assert_eq!(splitter.pending_len(), b"<div>tail".len());
        assert_eq!(splitter.finish().as_deref(), Some(&b"<div>tail"[..]));
    }

    #[test]
    fn test_group_start_keeps_nested_divs_together() {
        let mut splitter = BoundarySplitter::new(BoundaryStrategy::GroupStart, GROUP, 1024);
        let first = format!("<div class=\"{}\"><div>inner</div>", GROUP);
        assert!(splitter.push(first.as_bytes()).unwrap().is_none());

        let second = format!("</div><div class=\"{}\"><div>", GROUP);
        let complete = splitter.push(second.as_bytes()).unwrap().unwrap();
        assert_eq!(
            complete,
            format!("<div class=\"{}\"><div>inner</div></div>", GROUP).as_bytes()
        );
    }

    #[test]
    fn test_pending_bound_fails_fast() {
        let mut splitter = BoundarySplitter::new(BoundaryStrategy::LastClosingTag, GROUP, 16);
        assert!(splitter.push(b"<div>0123").unwrap().is_none());
        let err = splitter.push(b"456789abcdef").unwrap_err();
        assert!(matches!(err, SplitError::UnparseableInput { limit: 16 }));
    }

    proptest! {
        #[test]
        fn prop_split_is_byte_exact(parts in proptest::collection::vec("(</div>|<div>|[a-z <>/]{0,8})", 0..24)) {
            let buf = parts.concat();
            let (complete, rest) = split_complete(buf.as_bytes());
            let mut joined = complete.to_vec();
            joined.extend_from_slice(rest);
            prop_assert_eq!(joined, buf.as_bytes().to_vec());
            prop_assert!(memmem::find(rest, CLOSING_DIV).is_none());
            if !complete.is_empty() {
                prop_assert!(complete.ends_with(CLOSING_DIV));
            }
        }

        #[test]
        fn prop_splitter_loses_no_bytes(input in "([a-z]{0,6}</div>){0,12}[a-z<]{0,6}", size in 1usize..16) {
            let mut splitter = BoundarySplitter::new(BoundaryStrategy::LastClosingTag, GROUP, usize::MAX);
            let mut out = Vec::new();
            for chunk in input.as_bytes().chunks(size) {
                if let Some(complete) = splitter.push(chunk).unwrap() {
                    out.extend_from_slice(&complete);
                }
            }
            if let Some(rest) = splitter.finish() {
                out.extend_from_slice(&rest);
            }
            prop_assert_eq!(out, input.into_bytes());
        }
    }
}

//! Document frame: the header and footer every year file is wrapped in
//!
//! The header is everything before the message container's opening tag in
//! the first [`FRAME_SCAN_BYTES`] of the input. The footer closes the
//! container, body and html elements.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Result, SplitError};

/// How much of the input is inspected for the container's opening tag
pub const FRAME_SCAN_BYTES: usize = 100 * 1024;

/// Used when the container tag is not found in the scan window
pub const FALLBACK_HEADER: &str =
    "<!DOCTYPE html><html><head><title>Discord Messages</title><meta charset='utf-8'></head><body>";

pub const DEFAULT_FOOTER: &str = "</div></body></html>";

/// Header/footer markup shared read-only by all writers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFrame {
    pub header: String,
    pub footer: String,
    /// Synthetic opening tag written after the header, e.g. `<div class="chatlog">\n`
    pub container_open: String,
}

impl DocumentFrame {
    /// Read the start of `path` and capture the frame
    pub fn capture(path: &Path, container_class: &str) -> Result<Self> {
        let file = File::open(path).map_err(|source| SplitError::InputOpen {
            path: path.to_path_buf(),
            source,
        })?;

        let mut head = Vec::with_capacity(FRAME_SCAN_BYTES);
        file.take(FRAME_SCAN_BYTES as u64)
            .read_to_end(&mut head)
            .map_err(SplitError::InputRead)?;

        Ok(Self::from_prefix(&head, container_class))
    }

    /// Capture the frame from an in-memory prefix of the document
    pub fn from_prefix(prefix: &[u8], container_class: &str) -> Self {
        let marker = container_open_tag(container_class);
        let window = &prefix[..prefix.len().min(FRAME_SCAN_BYTES)];

        let header = match memchr::memmem::find(window, marker.as_bytes()) {
            Some(pos) => String::from_utf8_lossy(&window[..pos]).into_owned(),
            None => {
                tracing::warn!(
                    "container tag {} not found in the first {} bytes, using a generic header",
                    marker,
                    FRAME_SCAN_BYTES
                );
                FALLBACK_HEADER.to_string()
            }
        };

        Self {
            header,
            footer: DEFAULT_FOOTER.to_string(),
            container_open: format!("{}\n", marker),
        }
    }
}

/// Opening tag of the message container, as it appears in exported logs
pub fn container_open_tag(container_class: &str) -> String {
    format!("<div class=\"{}\">", container_class)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_header_is_prefix_before_container() {
        let doc = b"<html><head><title>x</title></head><body><div class=\"chatlog\"><div>m</div></div></body></html>";
        let frame = DocumentFrame::from_prefix(doc, "chatlog");
        assert_eq!(frame.header, "<html><head><title>x</title></head><body>");
        assert_eq!(frame.footer, "</div></body></html>");
        assert_eq!(frame.container_open, "<div class=\"chatlog\">\n");
    }

    #[test]
    fn test_fallback_header_without_container() {
        let frame = DocumentFrame::from_prefix(b"<html><body><p>nothing here</p>", "chatlog");
        assert_eq!(frame.header, FALLBACK_HEADER);
    }

    #[test]
    fn test_container_beyond_scan_window_is_ignored() {
        let mut doc = vec![b' '; FRAME_SCAN_BYTES];
        doc.extend_from_slice(b"<div class=\"chatlog\">");
        let frame = DocumentFrame::from_prefix(&doc, "chatlog");
        assert_eq!(frame.header, FALLBACK_HEADER);
    }

    #[test]
    fn test_capture_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "<!DOCTYPE html><body><div class=\"log\"><div></div></div>").unwrap();
        file.flush().unwrap();

        let frame = DocumentFrame::capture(file.path(), "log").unwrap();
        assert_eq!(frame.header, "<!DOCTYPE html><body>");
        assert_eq!(frame.container_open, "<div class=\"log\">\n");
    }

    #[test]
    fn test_capture_missing_file_is_input_open_error() {
        let err = DocumentFrame::capture(Path::new("/definitely/not/here.html"), "chatlog")
            .unwrap_err();
        assert!(matches!(err, SplitError::InputOpen { .. }));
        assert!(err.is_fatal());
    }
}

//! Message group extraction
//!
//! A batch is parsed with html5ever into an `RcDom`; message groups are the
//! `div` elements carrying the message class. The returned [`Messages`]
//! iterator walks the tree lazily in document order and serializes each
//! group only when it is yielded. It is not `Send` (RcDom nodes are `Rc`),
//! so extraction and consumption stay on the worker thread.

use html5ever::parse_document;
use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};

use crate::error::{Result, SplitError};

pub const DEFAULT_MESSAGE_CLASS: &str = "chatlog__message-group";
pub const DEFAULT_TIMESTAMP_CLASS: &str = "chatlog__timestamp";

/// Text pulled from a message's first timestamp element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampText {
    /// Trimmed text content
    pub text: String,
    /// `title` attribute, which exports use for the long date form
    pub title: Option<String>,
}

/// One complete message group as found in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFragment {
    /// Serialized outer HTML of the group
    pub markup: String,
    /// `None` when the group has no timestamp element
    pub timestamp: Option<TimestampText>,
}

/// Finds message groups and their timestamps in HTML fragments
#[derive(Debug, Clone)]
pub struct MessageExtractor {
    message_class: String,
    timestamp_class: String,
}

impl Default for MessageExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MESSAGE_CLASS, DEFAULT_TIMESTAMP_CLASS)
    }
}

impl MessageExtractor {
    pub fn new(message_class: &str, timestamp_class: &str) -> Self {
        Self {
            message_class: message_class.to_string(),
            timestamp_class: timestamp_class.to_string(),
        }
    }

    /// Parse a fragment and return its message groups, in document order
    pub fn extract(&self, fragment: &str) -> Messages<'_> {
        let dom = parse_document(RcDom::default(), Default::default()).one(fragment);
        Messages {
            extractor: self,
            stack: vec![dom.document.clone()],
        }
    }

    /// Like [`extract`](Self::extract) for a raw batch.
    ///
    /// A batch that is not UTF-8 produces no messages and an
    /// [`SplitError::InvalidUtf8`] for the caller to report.
    pub fn extract_bytes(&self, batch: u64, bytes: &[u8]) -> Result<Messages<'_>> {
        match std::str::from_utf8(bytes) {
            Ok(text) => Ok(self.extract(text)),
            Err(e) => Err(SplitError::InvalidUtf8 {
                batch,
                valid_up_to: e.valid_up_to(),
            }),
        }
    }

    fn is_message_group(&self, node: &Handle) -> bool {
        element_has_class(node, "div", &self.message_class)
    }

    fn find_timestamp(&self, group: &Handle) -> Option<TimestampText> {
        let mut stack: Vec<Handle> = group.children.borrow().iter().rev().cloned().collect();
        while let Some(node) = stack.pop() {
            if element_has_class(&node, "span", &self.timestamp_class) {
                let mut text = String::new();
                collect_text(&node, &mut text);
                return Some(TimestampText {
                    text: text.trim().to_string(),
                    title: attribute(&node, "title"),
                });
            }
            stack.extend(node.children.borrow().iter().rev().cloned());
        }
        None
    }

    fn fragment_for(&self, group: &Handle) -> MessageFragment {
        MessageFragment {
            markup: outer_html(group),
            timestamp: self.find_timestamp(group),
        }
    }
}

/// Lazy, single-pass sequence of message groups from one parsed fragment
pub struct Messages<'a> {
    extractor: &'a MessageExtractor,
    stack: Vec<Handle>,
}

impl Iterator for Messages<'_> {
    type Item = MessageFragment;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            if self.extractor.is_message_group(&node) {
                return Some(self.extractor.fragment_for(&node));
            }
            self.stack
                .extend(node.children.borrow().iter().rev().cloned());
        }
        None
    }
}

fn element_has_class(node: &Handle, tag: &str, class: &str) -> bool {
    match &node.data {
        NodeData::Element { name, attrs, .. } => {
            &*name.local == tag
                && attrs.borrow().iter().any(|attr| {
                    &*attr.name.local == "class"
                        && attr.value.split_whitespace().any(|c| c == class)
                })
        }
        _ => false,
    }
}

fn attribute(node: &Handle, key: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == key)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

fn collect_text(node: &Handle, out: &mut String) {
    if let NodeData::Text { contents } = &node.data {
        out.push_str(&contents.borrow());
    }
    for child in node.children.borrow().iter() {
        collect_text(child, out);
    }
}

fn outer_html(node: &Handle) -> String {
    let mut buf = Vec::new();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::IncludeNode,
        ..Default::default()
    };
    let handle: SerializableHandle = node.clone().into();
    if let Err(e) = serialize(&mut buf, &handle, opts) {
        tracing::warn!("serializing message group failed: {}", e);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

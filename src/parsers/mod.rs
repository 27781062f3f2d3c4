pub mod boundary;
pub mod message;

pub use boundary::{BoundarySplitter, BoundaryStrategy};
pub use message::{MessageExtractor, MessageFragment, Messages, TimestampText};

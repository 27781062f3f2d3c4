#![no_main]

use chatsplit::parsers::{BoundarySplitter, BoundaryStrategy};
use libfuzzer_sys::fuzz_target;

const MAX_PENDING: usize = 4096;

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let strategy = if data[0] & 1 == 0 {
        BoundaryStrategy::LastClosingTag
    } else {
        BoundaryStrategy::GroupStart
    };
    let chunk_size = (data[1] as usize % 64) + 1;
    let input = &data[2..];

    let mut splitter = BoundarySplitter::new(strategy, "chatlog__message-group", MAX_PENDING);
    let mut rebuilt = Vec::with_capacity(input.len());

    for chunk in input.chunks(chunk_size) {
        match splitter.push(chunk) {
            Ok(Some(batch)) => {
                assert!(!batch.is_empty());
                rebuilt.extend_from_slice(&batch);
            }
            Ok(None) => {}
            Err(_) => {
                assert!(splitter.pending_len() > MAX_PENDING);
                return;
            }
        }
    }
    if let Some(rest) = splitter.finish() {
        rebuilt.extend_from_slice(&rest);
    }

    // No byte is lost or duplicated across batches
    assert_eq!(rebuilt, input);
});

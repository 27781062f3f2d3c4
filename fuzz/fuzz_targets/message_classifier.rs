#![no_main]

use chatsplit::parsers::MessageExtractor;
use chatsplit::timestamp::{Classification, YearClassifier};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let classifier = match YearClassifier::new() {
        Ok(c) => c,
        Err(_) => return,
    };

    let extractor = MessageExtractor::default();
    let Ok(messages) = extractor.extract_bytes(0, data) else {
        return;
    };

    for message in messages {
        if let Classification::Year(year) = classifier.classify_timestamp(message.timestamp.as_ref())
        {
            assert!(year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit()));
        }
    }
});

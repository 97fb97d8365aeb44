#![no_main]

use libfuzzer_sys::fuzz_target;
use tzlink_wire::Message;

fuzz_target!(|data: &[u8]| {
    // Decoding arbitrary bytes must never panic, and anything that
    // decodes must re-encode
    if let Ok(message) = Message::decode(data) {
        let _ = message.encode();
    }
});

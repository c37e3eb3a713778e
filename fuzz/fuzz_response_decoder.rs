//! Fuzz target for the response and request frame decoders.
//!
//! Run with: cargo +nightly fuzz run fuzz_response_decoder
//!
//! Any byte sequence a render server could send must decode or fail
//! cleanly, and a decoded response must re-encode to the same bytes.

#![no_main]

use katex_filter_core::protocol::{decode_request, decode_response, encode_response};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(resp) = decode_response(data) {
        assert_eq!(encode_response(resp.status, &resp.payload), data);
    }
    let _ = decode_request(data);
});

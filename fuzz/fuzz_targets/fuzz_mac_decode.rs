//! Fuzz target: `MacFrameCodec::decode`
//!
//! Feeds arbitrary PHY buffers to the MAC parser. It must never panic, and
//! anything it accepts must re-encode to a buffer that decodes to the same
//! frame.
//!
//! cargo fuzz run fuzz_mac_decode

#![no_main]

use ieee802154_transceiver::frame::{FrameCodec, MAX_FRAME_LEN, MacFrameCodec};
use ieee802154_transceiver::transceiver::RawFrame;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Same truncation the receive relay applies.
    let raw = RawFrame::copy_from(data);

    if let Ok(frame) = MacFrameCodec.decode(raw.as_bytes()) {
        let mut buf = [0u8; MAX_FRAME_LEN];
        let len = MacFrameCodec
            .encode(&frame, &mut buf)
            .expect("decoded frame must re-encode");
        assert!(len <= raw.len(), "re-encoding grew the frame");
        let again = MacFrameCodec.decode(&buf[..len]).expect("re-encoded frame must decode");
        assert_eq!(again, frame);
    }
});

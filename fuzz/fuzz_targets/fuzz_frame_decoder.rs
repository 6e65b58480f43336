//! Fuzz target: `Frame::decode` and `Receiver::on_packet`
//!
//! Splits the input into packets on a length prefix and drives them
//! through the decoder and a receiver. Neither may panic, and whatever
//! the receiver delivers must stay within its configured limit.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use blsync::config::ProtocolConfig;
use blsync::protocol::{Frame, Message, ProHandler, Receiver};
use libfuzzer_sys::fuzz_target;

struct Sink;

impl ProHandler for Sink {
    fn on_command(&mut self, _id: u8, _data: &[u8]) -> Option<Message> {
        None
    }

    fn on_data(&mut self, _id: u8, data: &[u8]) -> Option<Message> {
        assert!(data.len() < 256, "delivered more than max_message_len");
        None
    }
}

fuzz_target!(|data: &[u8]| {
    let config = ProtocolConfig {
        max_message_len: 256,
        ..ProtocolConfig::default()
    };
    let mut rx = Receiver::new(&config, Sink);

    let mut rest = data;
    let mut now = 0u64;
    while let Some((&len, tail)) = rest.split_first() {
        let take = usize::from(len).min(tail.len());
        let (packet, next) = tail.split_at(take);
        rest = next;
        now += 250;

        if let Ok(frame) = Frame::decode(packet) {
            assert!(frame.payload.len() <= packet.len());
        }
        if let Ok(outcome) = rx.on_packet(packet, now) {
            if let Some(event) = outcome.event {
                assert!(event.data.len() < 256);
            }
        }
    }

    // After a reset the receiver must accept bytes cleanly again.
    rx.reset();
    let _ = rx.on_packet(data, now);
});

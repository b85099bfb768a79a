#![no_main]

use arbitrary::Arbitrary;
use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use loghaul_ingest::{Frame, Framing, RecordCodec};
use tokio_util::codec::Decoder;

const MAX_RECORD_SIZE: usize = 256;

#[derive(Debug, Arbitrary)]
struct Input {
    framing: u8,
    chunk: u8,
    data: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let framing = match input.framing % 3 {
        0 => Framing::Tagged,
        1 => Framing::Newline,
        _ => Framing::OctetCounting,
    };
    let mut codec = RecordCodec::new(framing, MAX_RECORD_SIZE);
    let mut buf = BytesMut::new();
    let chunk = usize::from(input.chunk).max(1);

    for piece in input.data.chunks(chunk) {
        buf.extend_from_slice(piece);
        loop {
            match codec.decode(&mut buf) {
                Ok(Some(Frame::Record(payload))) => assert!(payload.len() <= MAX_RECORD_SIZE),
                Ok(Some(Frame::Malformed(_))) => {}
                Ok(None) => break,
                Err(_) => return,
            }
        }
    }

    while let Ok(Some(frame)) = codec.decode_eof(&mut buf) {
        if let Frame::Record(payload) = frame {
            assert!(payload.len() <= MAX_RECORD_SIZE);
        }
    }
});

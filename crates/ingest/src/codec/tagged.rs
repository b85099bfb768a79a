//! `<rec>payload</rec>` 태그 프레이밍 코덱
//!
//! ```text
//! <rec>first</rec>\n<rec>second</rec>
//! ```
//!
//! - 레코드 사이의 공백/개행은 무시합니다.
//! - 연속된 프레임 바깥 바이트는 다음 `<rec>` 또는 EOF에서 하나의
//!   [`DecodeError::Unframed`]로 보고하고 버립니다.
//! - `max_record_size`를 넘는 페이로드는 다음 `</rec>`까지 버린 뒤 전체 크기로
//!   [`DecodeError::Oversized`]를 한 번 보고합니다.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

use super::{Frame, RecordDecoder, find, partial_suffix_len};
use crate::error::{DecodeError, FrameError};

const OPEN_TAG: &[u8] = b"<rec>";
const CLOSE_TAG: &[u8] = b"</rec>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// 다음 `<rec>`를 찾는 중 (`junk`는 아직 보고하지 않은 프레임 밖 바이트 수)
    Seeking { junk: usize },
    /// `<rec>` 이후 페이로드 수신 중 (`scanned`까지는 `</rec>` 없음 확인)
    InRecord { scanned: usize },
    /// 크기 초과 레코드를 `</rec>`까지 버리는 중
    Discarding { skipped: usize },
}

/// `<rec>..</rec>` 프레이밍 코덱
#[derive(Debug)]
pub struct TaggedCodec {
    max_record_size: usize,
    state: State,
    discarded_tail: usize,
}

impl TaggedCodec {
    /// 새 코덱을 생성합니다.
    pub fn new(max_record_size: usize) -> Self {
        Self {
            max_record_size,
            state: State::Seeking { junk: 0 },
            discarded_tail: 0,
        }
    }

    fn oversized(&self, size: usize) -> Frame {
        Frame::Malformed(DecodeError::Oversized {
            size,
            max: self.max_record_size,
        })
    }

    /// 프레임 밖 바이트를 모아 `<rec>`를 만나면 한 단위로 보고합니다.
    fn seek_open_tag(&mut self, buf: &mut BytesMut, mut junk: usize) -> Option<Frame> {
        if junk == 0 {
            let whitespace = buf.iter().take_while(|b| b.is_ascii_whitespace()).count();
            buf.advance(whitespace);
        }

        loop {
            if buf.starts_with(OPEN_TAG) {
                buf.advance(OPEN_TAG.len());
                self.state = State::InRecord { scanned: 0 };
                return (junk > 0).then_some(Frame::Malformed(DecodeError::Unframed { len: junk }));
            }
            if OPEN_TAG.starts_with(buf) {
                // 태그가 아직 덜 도착함 (빈 버퍼 포함)
                self.state = State::Seeking { junk };
                return None;
            }

            let skip = match find(buf, OPEN_TAG) {
                Some(pos) => pos,
                None => buf.len() - partial_suffix_len(buf, OPEN_TAG),
            };
            buf.advance(skip);
            junk += skip;
        }
    }
}

impl Decoder for TaggedCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        loop {
            match self.state {
                State::Seeking { junk } => {
                    if let Some(frame) = self.seek_open_tag(buf, junk) {
                        return Ok(Some(frame));
                    }
                    if matches!(self.state, State::Seeking { .. }) {
                        return Ok(None);
                    }
                }
                State::InRecord { scanned } => {
                    let from = scanned.saturating_sub(CLOSE_TAG.len() - 1);
                    match find(&buf[from..], CLOSE_TAG) {
                        Some(offset) => {
                            let end = from + offset;
                            self.state = State::Seeking { junk: 0 };
                            if end > self.max_record_size {
                                buf.advance(end + CLOSE_TAG.len());
                                return Ok(Some(self.oversized(end)));
                            }
                            let payload = buf.split_to(end).freeze();
                            buf.advance(CLOSE_TAG.len());
                            return Ok(Some(Frame::Record(payload)));
                        }
                        None => {
                            // 끝의 몇 바이트는 `</rec>` 조각일 수 있음
                            let keep = partial_suffix_len(buf, CLOSE_TAG);
                            if buf.len() - keep > self.max_record_size {
                                let skipped = buf.len() - keep;
                                buf.advance(skipped);
                                self.state = State::Discarding { skipped };
                                continue;
                            }
                            self.state = State::InRecord {
                                scanned: buf.len(),
                            };
                            return Ok(None);
                        }
                    }
                }
                State::Discarding { skipped } => match find(buf, CLOSE_TAG) {
                    Some(pos) => {
                        buf.advance(pos + CLOSE_TAG.len());
                        self.state = State::Seeking { junk: 0 };
                        return Ok(Some(self.oversized(skipped + pos)));
                    }
                    None => {
                        let keep = partial_suffix_len(buf, CLOSE_TAG);
                        let consumed = buf.len() - keep;
                        buf.advance(consumed);
                        self.state = State::Discarding {
                            skipped: skipped + consumed,
                        };
                        return Ok(None);
                    }
                },
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        let pending = match self.state {
            State::Seeking { junk } if junk > 0 => {
                // 남은 태그 조각은 다음 호출에서 미완성 단위로 처리
                self.state = State::Seeking { junk: 0 };
                return Ok(Some(Frame::Malformed(DecodeError::Unframed { len: junk })));
            }
            State::Seeking { .. } | State::InRecord { .. } => 0,
            State::Discarding { skipped } => skipped,
        };
        self.discarded_tail += pending + buf.len();
        buf.clear();
        self.state = State::Seeking { junk: 0 };
        Ok(None)
    }
}

impl RecordDecoder for TaggedCodec {
    fn framing(&self) -> &'static str {
        "tagged"
    }

    fn discarded_tail(&self) -> usize {
        self.discarded_tail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::test_util::{decode_chunked, records};

    #[test]
    fn decodes_consecutive_records() {
        let mut codec = TaggedCodec::new(1024);
        let frames = decode_chunked(&mut codec, b"<rec>A</rec>\n<rec>B</rec> <rec></rec>", 64);
        assert_eq!(records(&frames), vec!["A", "B", ""]);
        assert_eq!(codec.discarded_tail(), 0);
    }

    #[test]
    fn decodes_records_split_across_reads() {
        let mut codec = TaggedCodec::new(1024);
        let frames = decode_chunked(&mut codec, b"<rec>hello</rec><rec>world</rec>", 1);
        assert_eq!(records(&frames), vec!["hello", "world"]);
    }

    #[test]
    fn payload_may_contain_angle_brackets() {
        let mut codec = TaggedCodec::new(1024);
        let frames = decode_chunked(&mut codec, b"<rec>a <b> </re c</rec>", 3);
        assert_eq!(records(&frames), vec!["a <b> </re c"]);
    }

    #[test]
    fn junk_before_record_is_reported_unframed() {
        let mut codec = TaggedCodec::new(1024);
        let frames = decode_chunked(&mut codec, b"garbage<rec>ok</rec>", 64);
        assert_eq!(
            frames,
            vec![
                Frame::Malformed(DecodeError::Unframed { len: 7 }),
                Frame::Record(bytes::Bytes::from_static(b"ok")),
            ]
        );
    }

    #[test]
    fn oversized_record_is_reported_once_and_skipped() {
        let mut codec = TaggedCodec::new(4);
        let frames = decode_chunked(&mut codec, b"<rec>0123456789</rec><rec>ok</rec>", 3);
        let malformed = frames
            .iter()
            .filter(|f| matches!(f, Frame::Malformed(DecodeError::Oversized { .. })))
            .count();
        assert_eq!(malformed, 1);
        assert_eq!(records(&frames), vec!["ok"]);
    }

    #[test]
    fn oversized_complete_record_is_reported() {
        let mut codec = TaggedCodec::new(4);
        let frames = decode_chunked(&mut codec, b"<rec>12345</rec>", 64);
        assert_eq!(
            frames,
            vec![Frame::Malformed(DecodeError::Oversized { size: 5, max: 4 })]
        );
    }

    #[test]
    fn partial_record_at_eof_is_discarded() {
        let mut codec = TaggedCodec::new(1024);
        let frames = decode_chunked(&mut codec, b"<rec>A</rec><rec>B</rec><rec>unfinis", 5);
        assert_eq!(records(&frames), vec!["A", "B"]);
        assert_eq!(codec.discarded_tail(), "unfinis".len());
    }

    #[test]
    fn partial_open_tag_at_eof_is_discarded() {
        let mut codec = TaggedCodec::new(1024);
        let frames = decode_chunked(&mut codec, b"<rec>A</rec><re", 64);
        assert_eq!(records(&frames), vec!["A"]);
        assert_eq!(codec.discarded_tail(), 3);
    }

    #[test]
    fn junk_is_one_unit_regardless_of_read_boundaries() {
        let input = b"ab<x<rec>ok</rec>";
        let whole = decode_chunked(&mut TaggedCodec::new(1024), input, 64);
        assert_eq!(
            whole,
            vec![
                Frame::Malformed(DecodeError::Unframed { len: 4 }),
                Frame::Record(bytes::Bytes::from_static(b"ok")),
            ]
        );
        for chunk in 1..input.len() {
            assert_eq!(decode_chunked(&mut TaggedCodec::new(1024), input, chunk), whole);
        }
    }

    #[test]
    fn trailing_junk_is_reported_at_eof() {
        let mut codec = TaggedCodec::new(1024);
        let frames = decode_chunked(&mut codec, b"<rec>A</rec> x<y<re", 2);
        assert_eq!(
            frames,
            vec![
                Frame::Record(bytes::Bytes::from_static(b"A")),
                Frame::Malformed(DecodeError::Unframed { len: 3 }),
            ]
        );
        assert_eq!(codec.discarded_tail(), 3);
    }

    #[test]
    fn oversized_size_does_not_depend_on_read_boundaries() {
        let input = b"<rec>0123456789</re</rec><rec>ok</rec>";
        let whole = decode_chunked(&mut TaggedCodec::new(4), input, 64);
        assert_eq!(whole[0], Frame::Malformed(DecodeError::Oversized { size: 14, max: 4 }));
        for chunk in 1..input.len() {
            assert_eq!(decode_chunked(&mut TaggedCodec::new(4), input, chunk), whole);
        }
    }

    #[test]
    fn oversized_unfinished_record_is_discarded_tail() {
        let mut codec = TaggedCodec::new(4);
        let frames = decode_chunked(&mut codec, b"<rec>0123456789", 3);
        assert!(frames.is_empty());
        assert_eq!(codec.discarded_tail(), 10);
    }
}

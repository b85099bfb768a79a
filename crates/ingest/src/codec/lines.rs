//! Newline-delimited 프레이밍 코덱
//!
//! 한 줄이 하나의 레코드입니다. 끝의 `\r`은 제거하고 빈 줄은 건너뜁니다.
//! `max_record_size`를 넘는 줄은 다음 개행까지 버린 뒤 전체 크기로 한 번 보고합니다.
//! 개행 없이 끝난 줄은 크기와 관계없이 미완성 단위로 버립니다.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

use super::{Frame, RecordDecoder};
use crate::error::{DecodeError, FrameError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// 다음 개행을 찾는 중 (`next_index` 앞에는 개행 없음)
    Scanning { next_index: usize },
    /// 크기 초과 줄을 개행까지 버리는 중
    Discarding {
        /// 지금까지 버린 바이트 수
        skipped: usize,
        /// 마지막으로 버린 바이트가 `\r`인지
        ends_with_cr: bool,
    },
}

/// 개행 구분 코덱
#[derive(Debug)]
pub struct LineCodec {
    max_record_size: usize,
    state: State,
    discarded_tail: usize,
}

impl LineCodec {
    /// 새 코덱을 생성합니다.
    pub fn new(max_record_size: usize) -> Self {
        Self {
            max_record_size,
            state: State::Scanning { next_index: 0 },
            discarded_tail: 0,
        }
    }

    fn oversized(&self, size: usize) -> Frame {
        Frame::Malformed(DecodeError::Oversized {
            size,
            max: self.max_record_size,
        })
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

impl Decoder for LineCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        loop {
            match self.state {
                State::Scanning { next_index } => {
                    match buf[next_index..].iter().position(|b| *b == b'\n') {
                        Some(offset) => {
                            self.state = State::Scanning { next_index: 0 };
                            let mut line = buf.split_to(next_index + offset + 1);
                            let len = trim_line_ending(&line).len();
                            line.truncate(len);

                            if line.len() > self.max_record_size {
                                return Ok(Some(self.oversized(line.len())));
                            }
                            if line.iter().all(u8::is_ascii_whitespace) {
                                continue;
                            }
                            return Ok(Some(Frame::Record(line.freeze())));
                        }
                        None => {
                            // 끝의 `\r`은 줄 끝 표시일 수 있으므로 크기에서 제외
                            let ends_with_cr = buf.ends_with(b"\r");
                            if buf.len() - usize::from(ends_with_cr) > self.max_record_size {
                                self.state = State::Discarding {
                                    skipped: buf.len(),
                                    ends_with_cr,
                                };
                                buf.clear();
                                return Ok(None);
                            }
                            self.state = State::Scanning {
                                next_index: buf.len(),
                            };
                            return Ok(None);
                        }
                    }
                }
                State::Discarding {
                    skipped,
                    ends_with_cr,
                } => match buf.iter().position(|b| *b == b'\n') {
                    Some(offset) => {
                        let cr = match offset {
                            0 => ends_with_cr,
                            _ => buf[offset - 1] == b'\r',
                        };
                        buf.advance(offset + 1);
                        self.state = State::Scanning { next_index: 0 };
                        return Ok(Some(self.oversized(skipped + offset - usize::from(cr))));
                    }
                    None => {
                        if let Some(&last) = buf.last() {
                            self.state = State::Discarding {
                                skipped: skipped + buf.len(),
                                ends_with_cr: last == b'\r',
                            };
                            buf.clear();
                        }
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
            State::Scanning { .. } => 0,
            State::Discarding { skipped, .. } => skipped,
        };
        self.discarded_tail += pending + buf.len();
        buf.clear();
        self.state = State::Scanning { next_index: 0 };
        Ok(None)
    }
}

impl RecordDecoder for LineCodec {
    fn framing(&self) -> &'static str {
        "newline"
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
    fn decodes_lines_and_trims_crlf() {
        let mut codec = LineCodec::new(1024);
        let frames = decode_chunked(&mut codec, b"first\r\nsecond\nthird\n", 4);
        assert_eq!(records(&frames), vec!["first", "second", "third"]);
    }

    #[test]
    fn skips_blank_lines() {
        let mut codec = LineCodec::new(1024);
        let frames = decode_chunked(&mut codec, b"\n  \r\nmsg\n\n", 64);
        assert_eq!(frames.len(), 1);
        assert_eq!(records(&frames), vec!["msg"]);
    }

    #[test]
    fn oversized_line_is_reported_once_and_skipped() {
        let mut codec = LineCodec::new(4);
        let frames = decode_chunked(&mut codec, b"0123456789abcdef\nok\n", 3);
        let malformed = frames
            .iter()
            .filter(|f| matches!(f, Frame::Malformed(DecodeError::Oversized { .. })))
            .count();
        assert_eq!(malformed, 1);
        assert_eq!(records(&frames), vec!["ok"]);
    }

    #[test]
    fn unterminated_last_line_is_discarded() {
        let mut codec = LineCodec::new(1024);
        let frames = decode_chunked(&mut codec, b"one\ntwo\nthr", 2);
        assert_eq!(records(&frames), vec!["one", "two"]);
        assert_eq!(codec.discarded_tail(), 3);
    }

    #[test]
    fn crlf_line_of_exactly_max_size_survives_split_after_cr() {
        let input = b"abcd\r\nok\n";
        let whole = decode_chunked(&mut LineCodec::new(4), input, 64);
        let split = decode_chunked(&mut LineCodec::new(4), input, 5);

        assert_eq!(records(&whole), vec!["abcd", "ok"]);
        assert_eq!(split, whole);
    }

    #[test]
    fn oversized_size_does_not_depend_on_read_boundaries() {
        let input = b"0123456789\r\nok\n";
        let whole = decode_chunked(&mut LineCodec::new(4), input, 64);
        assert_eq!(
            whole,
            vec![
                Frame::Malformed(DecodeError::Oversized { size: 10, max: 4 }),
                Frame::Record(bytes::Bytes::from_static(b"ok")),
            ]
        );
        for chunk in 1..input.len() {
            assert_eq!(decode_chunked(&mut LineCodec::new(4), input, chunk), whole);
        }
    }

    #[test]
    fn oversized_unterminated_line_is_discarded_tail() {
        let mut codec = LineCodec::new(4);
        let frames = decode_chunked(&mut codec, b"ok\n0123456789", 3);
        assert_eq!(records(&frames), vec!["ok"]);
        assert_eq!(frames.len(), 1);
        assert_eq!(codec.discarded_tail(), 10);
    }
}

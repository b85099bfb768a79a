//! Octet-counting 프레이밍 코덱 (RFC 6587 Section 3.4.1)
//!
//! ```text
//! MSG-LEN SP MSG
//! 11 hello world5 again
//! ```
//!
//! 길이 헤더는 0으로 시작하지 않는 10진수입니다. 헤더가 손상되면 다음 레코드
//! 경계를 알 수 없으므로 [`FrameError::Desync`]로 연결을 종료합니다.
//! 길이가 `max_record_size`를 넘으면 [`DecodeError::Oversized`]를 보고하고
//! 정확히 그 길이만큼 건너뜁니다.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

use super::{Frame, RecordDecoder};
use crate::error::{DecodeError, FrameError};

/// 길이 헤더 최대 자릿수
const MAX_LEN_DIGITS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// 길이 헤더 대기
    Header,
    /// 페이로드 대기 (길이)
    Body(usize),
    /// 크기 초과 페이로드 건너뛰는 중 (남은 바이트)
    Skip(usize),
}

/// Octet-counting 코덱
#[derive(Debug)]
pub struct OctetCountingCodec {
    max_record_size: usize,
    state: State,
    discarded_tail: usize,
}

impl OctetCountingCodec {
    /// 새 코덱을 생성합니다.
    pub fn new(max_record_size: usize) -> Self {
        Self {
            max_record_size,
            state: State::Header,
            discarded_tail: 0,
        }
    }

    /// 길이 헤더를 파싱합니다. 헤더가 아직 덜 도착했으면 `Ok(None)`.
    fn parse_header(buf: &mut BytesMut) -> Result<Option<usize>, FrameError> {
        let Some(space) = buf.iter().take(MAX_LEN_DIGITS + 1).position(|b| *b == b' ') else {
            if buf.len() > MAX_LEN_DIGITS {
                return Err(desync("length header too long"));
            }
            if !buf.iter().all(u8::is_ascii_digit) {
                return Err(desync("length header is not numeric"));
            }
            return Ok(None);
        };

        let digits = &buf[..space];
        if digits.is_empty() || digits[0] == b'0' || !digits.iter().all(u8::is_ascii_digit) {
            return Err(desync(format!(
                "invalid length header '{}'",
                String::from_utf8_lossy(digits)
            )));
        }
        let len = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .ok_or_else(|| desync("length header out of range"))?;

        buf.advance(space + 1);
        Ok(Some(len))
    }
}

fn desync(reason: impl Into<String>) -> FrameError {
    FrameError::Desync {
        reason: reason.into(),
    }
}

impl Decoder for OctetCountingCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        loop {
            match self.state {
                State::Header => {
                    // 일부 송신자는 프레임 사이에 개행을 넣음
                    let whitespace = buf.iter().take_while(|b| b.is_ascii_whitespace()).count();
                    buf.advance(whitespace);
                    if buf.is_empty() {
                        return Ok(None);
                    }

                    let Some(len) = Self::parse_header(buf)? else {
                        return Ok(None);
                    };
                    if len > self.max_record_size {
                        self.state = State::Skip(len);
                        return Ok(Some(Frame::Malformed(DecodeError::Oversized {
                            size: len,
                            max: self.max_record_size,
                        })));
                    }
                    self.state = State::Body(len);
                }
                State::Body(len) => {
                    if buf.len() < len {
                        buf.reserve(len - buf.len());
                        return Ok(None);
                    }
                    self.state = State::Header;
                    return Ok(Some(Frame::Record(buf.split_to(len).freeze())));
                }
                State::Skip(remaining) => {
                    let n = remaining.min(buf.len());
                    buf.advance(n);
                    if n < remaining {
                        self.state = State::Skip(remaining - n);
                        return Ok(None);
                    }
                    self.state = State::Header;
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        if !buf.is_empty() && !matches!(self.state, State::Skip(_)) {
            self.discarded_tail += buf.len();
        }
        buf.clear();
        self.state = State::Header;
        Ok(None)
    }
}

impl RecordDecoder for OctetCountingCodec {
    fn framing(&self) -> &'static str {
        "octet-counting"
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
    fn decodes_counted_frames() {
        let mut codec = OctetCountingCodec::new(1024);
        let frames = decode_chunked(&mut codec, b"11 hello world5 again\n3 a b", 2);
        assert_eq!(records(&frames), vec!["hello world", "again", "a b"]);
    }

    #[test]
    fn payload_may_contain_newlines_and_digits() {
        let mut codec = OctetCountingCodec::new(1024);
        let frames = decode_chunked(&mut codec, b"7 12\n3 45", 64);
        assert_eq!(records(&frames), vec!["12\n3 45"]);
    }

    #[test]
    fn oversized_frame_is_skipped_exactly() {
        let mut codec = OctetCountingCodec::new(4);
        let frames = decode_chunked(&mut codec, b"10 01234567892 ok", 3);
        assert_eq!(
            frames,
            vec![
                Frame::Malformed(DecodeError::Oversized { size: 10, max: 4 }),
                Frame::Record(bytes::Bytes::from_static(b"ok")),
            ]
        );
    }

    #[test]
    fn non_numeric_header_is_fatal() {
        let mut codec = OctetCountingCodec::new(1024);
        let mut buf = BytesMut::from(&b"abc hello"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(FrameError::Desync { .. })
        ));
    }

    #[test]
    fn zero_leading_header_is_fatal() {
        let mut codec = OctetCountingCodec::new(1024);
        let mut buf = BytesMut::from(&b"05 hello"[..]);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn overlong_header_is_fatal() {
        let mut codec = OctetCountingCodec::new(1024);
        let mut buf = BytesMut::from(&b"123456789012345"[..]);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn short_body_at_eof_is_discarded() {
        let mut codec = OctetCountingCodec::new(1024);
        let frames = decode_chunked(&mut codec, b"2 ok10 short", 4);
        assert_eq!(records(&frames), vec!["ok"]);
        assert_eq!(codec.discarded_tail(), "short".len());
    }
}

//! 레코드 코덱 -- 바이트 스트림을 개별 레코드 프레임으로 분리합니다.
//!
//! 각 코덱은 [`tokio_util::codec::Decoder`]를 구현하며 다음을 반환합니다:
//! - `Ok(Some(Frame::Record(..)))`: 완전한 레코드
//! - `Ok(Some(Frame::Malformed(..)))`: 잘못된 단위 (이미 버퍼에서 제거됨)
//! - `Ok(None)`: 더 많은 바이트 필요
//! - `Err(FrameError)`: 스트림 동기화 상실 등 치명적 에러
//!
//! # 지원 프레이밍
//! - [`TaggedCodec`]: `<rec>payload</rec>`
//! - [`LineCodec`]: 개행 구분
//! - [`OctetCountingCodec`]: RFC 6587 octet-counting (`LEN SP MSG`)
//!
//! 스트림 종료 시 미완성 단위는 레코드로 내보내지 않고 버린 뒤
//! [`RecordDecoder::discarded_tail`]에 크기를 기록합니다.

pub mod lines;
pub mod octet;
pub mod tagged;

pub use lines::LineCodec;
pub use octet::OctetCountingCodec;
pub use tagged::TaggedCodec;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;

use crate::config::Framing;
use crate::error::{DecodeError, FrameError};

/// 코덱이 내보내는 단위
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// 완전한 레코드 페이로드
    Record(Bytes),
    /// 잘못된 단위 (디코드 에러 정책으로 처리)
    Malformed(DecodeError),
}

/// 연결 워커가 사용하는 디코더 trait
///
/// 새로운 프레이밍을 지원하려면 이 trait을 구현합니다.
pub trait RecordDecoder: Decoder<Item = Frame, Error = FrameError> + Send {
    /// 프레이밍 이름 (메트릭 레이블)
    fn framing(&self) -> &'static str;

    /// 스트림 종료 시 버려진 미완성 단위의 바이트 수
    fn discarded_tail(&self) -> usize;
}

/// 설정된 프레이밍에 따라 구체 코덱을 선택하는 래퍼
#[derive(Debug)]
pub enum RecordCodec {
    /// `<rec>..</rec>` 프레이밍
    Tagged(TaggedCodec),
    /// 개행 프레이밍
    Lines(LineCodec),
    /// octet-counting 프레이밍
    OctetCounting(OctetCountingCodec),
}

impl RecordCodec {
    /// 프레이밍 방식과 최대 레코드 크기로 코덱을 생성합니다.
    pub fn new(framing: Framing, max_record_size: usize) -> Self {
        match framing {
            Framing::Tagged => Self::Tagged(TaggedCodec::new(max_record_size)),
            Framing::Newline => Self::Lines(LineCodec::new(max_record_size)),
            Framing::OctetCounting => {
                Self::OctetCounting(OctetCountingCodec::new(max_record_size))
            }
        }
    }
}

impl Decoder for RecordCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        match self {
            Self::Tagged(codec) => codec.decode(buf),
            Self::Lines(codec) => codec.decode(buf),
            Self::OctetCounting(codec) => codec.decode(buf),
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        match self {
            Self::Tagged(codec) => codec.decode_eof(buf),
            Self::Lines(codec) => codec.decode_eof(buf),
            Self::OctetCounting(codec) => codec.decode_eof(buf),
        }
    }
}

impl RecordDecoder for RecordCodec {
    fn framing(&self) -> &'static str {
        match self {
            Self::Tagged(codec) => codec.framing(),
            Self::Lines(codec) => codec.framing(),
            Self::OctetCounting(codec) => codec.framing(),
        }
    }

    fn discarded_tail(&self) -> usize {
        match self {
            Self::Tagged(codec) => codec.discarded_tail(),
            Self::Lines(codec) => codec.discarded_tail(),
            Self::OctetCounting(codec) => codec.discarded_tail(),
        }
    }
}

/// `haystack`에서 `needle`이 처음 나타나는 위치
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// `buf` 끝이 `pattern`의 앞부분과 일치하는 최대 길이 (`pattern.len()` 미만)
///
/// 다음 읽기에서 완성될 수 있는 태그 조각을 보존할 때 사용합니다.
pub(crate) fn partial_suffix_len(buf: &[u8], pattern: &[u8]) -> usize {
    let max = pattern.len().saturating_sub(1).min(buf.len());
    (1..=max)
        .rev()
        .find(|&k| buf.ends_with(&pattern[..k]))
        .unwrap_or(0)
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;

    /// 입력을 `chunk` 크기로 나눠 공급하고 EOF까지 모든 프레임을 수집합니다.
    pub fn decode_chunked<D>(codec: &mut D, input: &[u8], chunk: usize) -> Vec<Frame>
    where
        D: Decoder<Item = Frame, Error = FrameError>,
    {
        let mut buf = BytesMut::new();
        let mut frames = Vec::new();
        for piece in input.chunks(chunk.max(1)) {
            buf.extend_from_slice(piece);
            while let Some(frame) = codec.decode(&mut buf).expect("decode failed") {
                frames.push(frame);
            }
        }
        while let Some(frame) = codec.decode_eof(&mut buf).expect("decode_eof failed") {
            frames.push(frame);
        }
        frames
    }

    /// 레코드 페이로드만 문자열로 추출합니다.
    pub fn records(frames: &[Frame]) -> Vec<String> {
        frames
            .iter()
            .filter_map(|f| match f {
                Frame::Record(payload) => Some(String::from_utf8_lossy(payload).into_owned()),
                Frame::Malformed(_) => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_locates_needle() {
        assert_eq!(find(b"abc<rec>", b"<rec>"), Some(3));
        assert_eq!(find(b"abc", b"<rec>"), None);
        assert_eq!(find(b"", b"x"), None);
    }

    #[test]
    fn partial_suffix_detects_tag_prefix() {
        assert_eq!(partial_suffix_len(b"junk<re", b"<rec>"), 3);
        assert_eq!(partial_suffix_len(b"junk<", b"<rec>"), 1);
        assert_eq!(partial_suffix_len(b"junk", b"<rec>"), 0);
        // 완전한 태그는 조각이 아님
        assert_eq!(partial_suffix_len(b"<rec>", b"<rec>"), 0);
    }

    #[test]
    fn record_codec_dispatches_by_framing() {
        let codec = RecordCodec::new(Framing::OctetCounting, 1024);
        assert_eq!(codec.framing(), "octet-counting");
        let codec = RecordCodec::new(Framing::Newline, 1024);
        assert_eq!(codec.framing(), "newline");
        let mut codec = RecordCodec::new(Framing::Tagged, 1024);
        let frames = test_util::decode_chunked(&mut codec, b"<rec>A</rec>", 4);
        assert_eq!(test_util::records(&frames), vec!["A"]);
    }
}

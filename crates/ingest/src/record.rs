//! 수신 레코드 -- 워커가 생성하고 공유 큐 소비자가 꺼내는 단위

use std::borrow::Cow;
use std::net::SocketAddr;
use std::time::SystemTime;

use bytes::Bytes;

/// 연결 하나에서 디코딩된 로그 레코드
///
/// 페이로드는 불투명한 바이트이며, 하위 소비자가 출처를 식별할 수 있도록
/// 원격 주소, 연결 ID, 연결 내 순번을 함께 담습니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// 레코드 페이로드 (프레이밍 제거됨)
    pub payload: Bytes,
    /// 원격 producer 주소
    pub peer: SocketAddr,
    /// 리스너가 부여한 연결 ID (1부터 증가)
    pub connection_id: u64,
    /// 연결 내 순번 (0부터 증가)
    pub sequence: u64,
    /// 디코딩 시각
    pub received_at: SystemTime,
}

impl LogRecord {
    /// 새 레코드를 생성합니다.
    pub fn new(payload: Bytes, peer: SocketAddr, connection_id: u64, sequence: u64) -> Self {
        Self {
            payload,
            peer,
            connection_id,
            sequence,
            received_at: SystemTime::now(),
        }
    }

    /// 페이로드를 UTF-8 문자열로 반환합니다 (잘못된 바이트는 대체 문자).
    pub fn payload_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// `tcp:<peer>#<connection_id>` 형식의 출처 식별자
    pub fn source(&self) -> String {
        format!("tcp:{}#{}", self.peer, self.connection_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_attribution() {
        let peer: SocketAddr = "10.0.0.7:51000".parse().unwrap();
        let record = LogRecord::new(Bytes::from_static(b"disk full"), peer, 3, 0);
        assert_eq!(record.payload_lossy(), "disk full");
        assert_eq!(record.source(), "tcp:10.0.0.7:51000#3");
        assert_eq!(record.sequence, 0);
    }

    #[test]
    fn payload_lossy_replaces_invalid_utf8() {
        let peer: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let record = LogRecord::new(Bytes::from_static(b"ok\xff"), peer, 1, 0);
        assert_eq!(record.payload_lossy(), "ok\u{fffd}");
    }
}

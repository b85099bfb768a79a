//! 수신 계층 에러 타입
//!
//! [`IngestError`]는 리스너와 연결 워커에서 발생하는 모든 에러를 표현합니다.
//! 에러는 발생 지점에 격리됩니다:
//! - `Bind`, `Listener`: 데몬 전체에 치명적
//! - `Accept`: 로그 후 accept 루프 계속
//! - `ConnectionIo`, `Decode`, `Framing`, `ReadTimeout`, `Queue`: 해당 연결만 종료
//!
//! `From<IngestError> for LoghaulError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use std::net::SocketAddr;
use std::time::Duration;

use loghaul_core::error::{ConfigError, LoghaulError, PipelineError};

/// 수신 계층 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// 리스닝 소켓 생성 실패 (주소 사용 중, 권한 부족 등)
    #[error("bind error: {addr}: {source}")]
    Bind {
        /// 바인드 시도 주소
        addr: String,
        /// 원인 I/O 에러
        source: std::io::Error,
    },

    /// 단일 accept 시도 실패 (일시적)
    #[error("accept error: {0}")]
    Accept(std::io::Error),

    /// 리스닝 소켓 자체가 더 이상 사용 불가
    #[error("listener error: {0}")]
    Listener(std::io::Error),

    /// 연결 읽기 중 I/O 실패
    #[error("connection io error from {peer}: {source}")]
    ConnectionIo {
        /// 원격 주소
        peer: SocketAddr,
        /// 원인 I/O 에러
        source: std::io::Error,
    },

    /// 디코드 실패 (terminate 정책)
    #[error("decode error from {peer}: {source}")]
    Decode {
        /// 원격 주소
        peer: SocketAddr,
        /// 디코드 실패 사유
        source: DecodeError,
    },

    /// 프레임 경계를 더 이상 찾을 수 없음
    #[error("framing error from {peer}: {reason}")]
    Framing {
        /// 원격 주소
        peer: SocketAddr,
        /// 사유
        reason: String,
    },

    /// 읽기 타임아웃
    #[error("read timeout from {peer} after {timeout:?}")]
    ReadTimeout {
        /// 원격 주소
        peer: SocketAddr,
        /// 적용된 타임아웃
        timeout: Duration,
    },

    /// 공유 큐 push 실패
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl IngestError {
    /// 설정 에러를 생성합니다.
    pub(crate) fn config(field: &str, reason: impl Into<String>) -> Self {
        Self::Config {
            field: field.to_owned(),
            reason: reason.into(),
        }
    }
}

impl From<IngestError> for LoghaulError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Config { field, reason } => {
                LoghaulError::Config(ConfigError::InvalidValue { field, reason })
            }
            bind @ IngestError::Bind { .. } => {
                LoghaulError::Pipeline(PipelineError::InitFailed(bind.to_string()))
            }
            other => LoghaulError::Pipeline(PipelineError::Failed(other.to_string())),
        }
    }
}

/// 잘못된 레코드 단위에 대한 디코드 에러
///
/// 코덱은 이 에러를 보고하기 전에 문제 단위를 버퍼에서 제거하므로,
/// drop 정책에서는 다음 레코드부터 계속 디코딩할 수 있습니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// 레코드가 최대 크기를 초과함
    #[error("record too large: {size} bytes (max: {max})")]
    Oversized {
        /// 페이로드 전체 크기 (줄 끝 제외)
        size: usize,
        /// 허용 최대 크기
        max: usize,
    },

    /// 레코드 프레임 바깥의 바이트
    #[error("{len} bytes outside of a record frame")]
    Unframed {
        /// 버려진 바이트 수
        len: usize,
    },
}

/// 코덱 수준의 치명적 에러
///
/// 이 에러가 발생하면 스트림에서 레코드 경계를 복구할 수 없으므로
/// 디코드 에러 정책과 무관하게 연결을 종료합니다.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// 소켓 I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 길이 헤더 등이 손상되어 동기화를 잃음
    #[error("lost frame synchronisation: {reason}")]
    Desync {
        /// 사유
        reason: String,
    },
}

/// 공유 큐 push 실패
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// reject 모드에서 큐가 가득 참
    #[error("queue full (capacity {capacity})")]
    Full {
        /// 큐 용량
        capacity: usize,
    },

    /// wait 모드에서 대기 시간 초과
    #[error("queue push timed out after {waited:?}")]
    Timeout {
        /// 대기한 시간
        waited: Duration,
    },

    /// 소비자가 큐를 닫음
    #[error("queue closed")]
    Closed,
}

impl QueueError {
    /// 메트릭 레이블용 사유 문자열
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Full { .. } => "full",
            Self::Timeout { .. } => "timeout",
            Self::Closed => "closed",
        }
    }
}

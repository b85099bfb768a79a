//! 수신 계층 설정
//!
//! core의 [`IngestConfig`](loghaul_core::config::IngestConfig)와
//! [`QueueConfig`](loghaul_core::config::QueueConfig)를 문자열/초 단위 값에서
//! 타입이 있는 설정([`ListenerConfig`], [`WorkerConfig`], [`SharedQueueConfig`])으로
//! 변환합니다.
//!
//! # 사용 예시
//! ```ignore
//! use loghaul_core::config::LoghaulConfig;
//! use loghaul_ingest::config::{ListenerConfig, SharedQueueConfig};
//!
//! let core = LoghaulConfig::default();
//! let listener = ListenerConfig::from_core(&core.ingest)?;
//! let queue = SharedQueueConfig::from_core(&core.queue)?;
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::error::IngestError;

/// 레코드 프레이밍 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framing {
    /// `<rec>payload</rec>` 태그 구분 (기본값)
    #[default]
    Tagged,
    /// 개행 문자로 레코드 구분
    Newline,
    /// Octet-counting (RFC 6587): `LEN SP MSG`
    OctetCounting,
}

impl Framing {
    /// 설정/메트릭에서 사용하는 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tagged => "tagged",
            Self::Newline => "newline",
            Self::OctetCounting => "octet-counting",
        }
    }
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Framing {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tagged" => Ok(Self::Tagged),
            "newline" => Ok(Self::Newline),
            "octet-counting" => Ok(Self::OctetCounting),
            other => Err(IngestError::config(
                "framing",
                format!("unknown framing '{other}'"),
            )),
        }
    }
}

/// 잘못된 레코드 단위를 만났을 때의 처리 정책
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecodeErrorPolicy {
    /// 문제 단위를 버리고 계속 디코딩
    Drop,
    /// 연결을 종료 (기본값)
    #[default]
    Terminate,
}

impl FromStr for DecodeErrorPolicy {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "drop" => Ok(Self::Drop),
            "terminate" => Ok(Self::Terminate),
            other => Err(IngestError::config(
                "decode_error_policy",
                format!("unknown policy '{other}'"),
            )),
        }
    }
}

/// 큐가 가득 찼을 때 push 동작
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backpressure {
    /// 공간이 생길 때까지 대기 (push_timeout까지, 기본값)
    #[default]
    Wait,
    /// 즉시 `QueueError::Full` 반환
    Reject,
}

impl FromStr for Backpressure {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wait" => Ok(Self::Wait),
            "reject" => Ok(Self::Reject),
            other => Err(IngestError::config(
                "backpressure",
                format!("unknown backpressure mode '{other}'"),
            )),
        }
    }
}

/// 연결 워커 설정
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// 프레이밍 방식
    pub framing: Framing,
    /// 레코드 최대 크기 (바이트)
    pub max_record_size: usize,
    /// 수신 버퍼 초기 크기 (바이트)
    pub recv_buffer_size: usize,
    /// 다음 레코드를 기다리는 최대 시간
    pub read_timeout: Duration,
    /// 디코드 에러 정책
    pub decode_error_policy: DecodeErrorPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            framing: Framing::default(),
            max_record_size: 1024 * 1024, // 1MB
            recv_buffer_size: 64 * 1024,  // 64KB
            read_timeout: Duration::from_secs(300),
            decode_error_policy: DecodeErrorPolicy::default(),
        }
    }
}

impl WorkerConfig {
    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_record_size == 0 {
            return Err(IngestError::config(
                "max_record_size",
                "must be greater than 0",
            ));
        }
        if self.recv_buffer_size == 0 {
            return Err(IngestError::config(
                "recv_buffer_size",
                "must be greater than 0",
            ));
        }
        if self.read_timeout.is_zero() {
            return Err(IngestError::config("read_timeout", "must be greater than 0"));
        }
        Ok(())
    }
}

/// 수신 리스너 설정
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// 바인드 주소 (IP 또는 호스트명)
    pub bind_address: String,
    /// 바인드 포트 (0이면 임시 포트)
    pub port: u16,
    /// listen backlog
    pub backlog: u32,
    /// 최대 동시 연결 수
    pub max_connections: usize,
    /// 일시적 accept 실패 후 대기 시간
    pub accept_backoff: Duration,
    /// 종료 시 워커를 기다리는 시간
    pub shutdown_grace: Duration,
    /// 연결 워커 설정
    pub worker: WorkerConfig,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_owned(),
            port: 5140,
            backlog: 99,
            max_connections: 256,
            accept_backoff: Duration::from_millis(50),
            shutdown_grace: Duration::from_secs(5),
            worker: WorkerConfig::default(),
        }
    }
}

impl ListenerConfig {
    /// core의 `IngestConfig`에서 리스너 설정을 생성합니다.
    pub fn from_core(core: &loghaul_core::config::IngestConfig) -> Result<Self, IngestError> {
        let config = Self {
            bind_address: core.bind_address.clone(),
            port: core.port,
            backlog: core.backlog,
            max_connections: core.max_connections,
            accept_backoff: Duration::from_millis(core.accept_backoff_ms),
            shutdown_grace: Duration::from_secs(core.shutdown_grace_secs),
            worker: WorkerConfig {
                framing: core.framing.parse()?,
                max_record_size: core.max_record_size,
                recv_buffer_size: core.recv_buffer_size,
                read_timeout: Duration::from_secs(core.read_timeout_secs),
                decode_error_policy: core.decode_error_policy.parse()?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// 새 빌더를 생성합니다.
    pub fn builder() -> ListenerConfigBuilder {
        ListenerConfigBuilder::default()
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.bind_address.trim().is_empty() {
            return Err(IngestError::config("bind_address", "must not be empty"));
        }
        if self.backlog == 0 {
            return Err(IngestError::config("backlog", "must be greater than 0"));
        }
        if self.max_connections == 0 || self.max_connections > Semaphore::MAX_PERMITS {
            return Err(IngestError::config(
                "max_connections",
                format!("must be 1-{}", Semaphore::MAX_PERMITS),
            ));
        }
        self.worker.validate()
    }
}

/// 리스너 설정 빌더
#[derive(Default)]
pub struct ListenerConfigBuilder {
    config: ListenerConfig,
}

impl ListenerConfigBuilder {
    /// 바인드 주소를 설정합니다.
    pub fn bind_address(mut self, address: impl Into<String>) -> Self {
        self.config.bind_address = address.into();
        self
    }

    /// 바인드 포트를 설정합니다.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// listen backlog을 설정합니다.
    pub fn backlog(mut self, backlog: u32) -> Self {
        self.config.backlog = backlog;
        self
    }

    /// 최대 동시 연결 수를 설정합니다.
    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = max;
        self
    }

    /// accept 실패 후 대기 시간을 설정합니다.
    pub fn accept_backoff(mut self, backoff: Duration) -> Self {
        self.config.accept_backoff = backoff;
        self
    }

    /// 종료 대기 시간을 설정합니다.
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace = grace;
        self
    }

    /// 프레이밍 방식을 설정합니다.
    pub fn framing(mut self, framing: Framing) -> Self {
        self.config.worker.framing = framing;
        self
    }

    /// 레코드 최대 크기를 설정합니다.
    pub fn max_record_size(mut self, size: usize) -> Self {
        self.config.worker.max_record_size = size;
        self
    }

    /// 읽기 타임아웃을 설정합니다.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.worker.read_timeout = timeout;
        self
    }

    /// 디코드 에러 정책을 설정합니다.
    pub fn decode_error_policy(mut self, policy: DecodeErrorPolicy) -> Self {
        self.config.worker.decode_error_policy = policy;
        self
    }

    /// 설정을 검증하고 `ListenerConfig`를 생성합니다.
    pub fn build(self) -> Result<ListenerConfig, IngestError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// 공유 큐 설정
#[derive(Debug, Clone)]
pub struct SharedQueueConfig {
    /// 큐 용량 (레코드 수)
    pub capacity: usize,
    /// 큐가 가득 찼을 때 동작
    pub backpressure: Backpressure,
    /// wait 모드에서 push 최대 대기 시간
    pub push_timeout: Duration,
}

impl Default for SharedQueueConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            backpressure: Backpressure::default(),
            push_timeout: Duration::from_secs(5),
        }
    }
}

impl SharedQueueConfig {
    /// core의 `QueueConfig`에서 큐 설정을 생성합니다.
    pub fn from_core(core: &loghaul_core::config::QueueConfig) -> Result<Self, IngestError> {
        let config = Self {
            capacity: core.capacity,
            backpressure: core.backpressure.parse()?,
            push_timeout: Duration::from_millis(core.push_timeout_ms),
        };
        config.validate()?;
        Ok(config)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.capacity == 0 {
            return Err(IngestError::config("capacity", "must be greater than 0"));
        }
        if self.push_timeout.is_zero() {
            return Err(IngestError::config("push_timeout", "must be greater than 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configs_are_valid() {
        ListenerConfig::default().validate().unwrap();
        SharedQueueConfig::default().validate().unwrap();
    }

    #[test]
    fn from_core_preserves_values() {
        let core = loghaul_core::config::IngestConfig {
            bind_address: "127.0.0.1".to_owned(),
            port: 6514,
            backlog: 10,
            framing: "octet-counting".to_owned(),
            decode_error_policy: "drop".to_owned(),
            read_timeout_secs: 30,
            ..Default::default()
        };
        let config = ListenerConfig::from_core(&core).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.port, 6514);
        assert_eq!(config.backlog, 10);
        assert_eq!(config.worker.framing, Framing::OctetCounting);
        assert_eq!(config.worker.decode_error_policy, DecodeErrorPolicy::Drop);
        assert_eq!(config.worker.read_timeout, Duration::from_secs(30));
    }

    #[test]
    fn from_core_rejects_unknown_framing() {
        let core = loghaul_core::config::IngestConfig {
            framing: "xml".to_owned(),
            ..Default::default()
        };
        let err = ListenerConfig::from_core(&core).unwrap_err();
        assert!(err.to_string().contains("framing"));
    }

    #[test]
    fn queue_from_core_parses_backpressure() {
        let core = loghaul_core::config::QueueConfig {
            capacity: 8,
            backpressure: "reject".to_owned(),
            push_timeout_ms: 250,
        };
        let config = SharedQueueConfig::from_core(&core).unwrap();
        assert_eq!(config.capacity, 8);
        assert_eq!(config.backpressure, Backpressure::Reject);
        assert_eq!(config.push_timeout, Duration::from_millis(250));
    }

    #[test]
    fn builder_creates_valid_config() {
        let config = ListenerConfig::builder()
            .bind_address("127.0.0.1")
            .port(0)
            .backlog(1)
            .framing(Framing::Newline)
            .build()
            .unwrap();
        assert_eq!(config.port, 0);
        assert_eq!(config.backlog, 1);
        assert_eq!(config.worker.framing, Framing::Newline);
    }

    #[test]
    fn builder_rejects_invalid_config() {
        assert!(ListenerConfig::builder().backlog(0).build().is_err());
        assert!(ListenerConfig::builder().max_connections(0).build().is_err());
        assert!(
            ListenerConfig::builder()
                .read_timeout(Duration::ZERO)
                .build()
                .is_err()
        );
    }

    #[test]
    fn framing_names_roundtrip_through_from_str() {
        for framing in [Framing::Tagged, Framing::Newline, Framing::OctetCounting] {
            assert_eq!(framing.as_str().parse::<Framing>().unwrap(), framing);
        }
    }

    #[test]
    fn policy_defaults() {
        assert_eq!(DecodeErrorPolicy::default(), DecodeErrorPolicy::Terminate);
        assert_eq!(Backpressure::default(), Backpressure::Wait);
        assert_eq!(Framing::default(), Framing::Tagged);
    }
}

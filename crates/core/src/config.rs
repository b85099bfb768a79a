//! 설정 관리 -- loghaul.toml 파싱 및 런타임 설정
//!
//! [`LoghaulConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선, 데몬에서 적용)
//! 2. 환경변수 (`LOGHAUL_INGEST_PORT=5140` 형식)
//! 3. 설정 파일 (`loghaul.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), loghaul_core::error::LoghaulError> {
//! use loghaul_core::config::LoghaulConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LoghaulConfig::load("loghaul.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LoghaulConfig::parse("[ingest]\nport = 5140")?;
//! # Ok(())
//! # }
//! ```

use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LoghaulError};

/// 허용되는 로그 레벨
pub const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
/// 허용되는 로그 출력 형식
pub const VALID_LOG_FORMATS: [&str; 2] = ["json", "pretty"];
/// 허용되는 레코드 프레이밍 방식
pub const VALID_FRAMINGS: [&str; 3] = ["tagged", "newline", "octet-counting"];
/// 허용되는 디코드 에러 정책
pub const VALID_DECODE_ERROR_POLICIES: [&str; 2] = ["drop", "terminate"];
/// 허용되는 큐 backpressure 방식
pub const VALID_BACKPRESSURE: [&str; 2] = ["wait", "reject"];

const MAX_RECORD_SIZE_LIMIT: usize = 16 * 1024 * 1024;
const MAX_QUEUE_CAPACITY: usize = 10_000_000;

/// loghaul 통합 설정
///
/// `loghaul.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoghaulConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 수신 리스너/워커 설정
    #[serde(default)]
    pub ingest: IngestConfig,
    /// 공유 큐 설정
    #[serde(default)]
    pub queue: QueueConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl LoghaulConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LoghaulError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LoghaulError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LoghaulError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LoghaulError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LoghaulError> {
        toml::from_str(toml_str).map_err(|e| {
            LoghaulError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGHAUL_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGHAUL_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGHAUL_GENERAL_LOG_FORMAT");

        // Ingest
        let ingest = &mut self.ingest;
        override_string(&mut ingest.bind_address, "LOGHAUL_INGEST_BIND_ADDRESS");
        override_parsed(&mut ingest.port, "LOGHAUL_INGEST_PORT");
        override_parsed(&mut ingest.backlog, "LOGHAUL_INGEST_BACKLOG");
        override_parsed(&mut ingest.max_connections, "LOGHAUL_INGEST_MAX_CONNECTIONS");
        override_parsed(
            &mut ingest.read_timeout_secs,
            "LOGHAUL_INGEST_READ_TIMEOUT_SECS",
        );
        override_parsed(&mut ingest.max_record_size, "LOGHAUL_INGEST_MAX_RECORD_SIZE");
        override_parsed(
            &mut ingest.recv_buffer_size,
            "LOGHAUL_INGEST_RECV_BUFFER_SIZE",
        );
        override_string(&mut ingest.framing, "LOGHAUL_INGEST_FRAMING");
        override_string(
            &mut ingest.decode_error_policy,
            "LOGHAUL_INGEST_DECODE_ERROR_POLICY",
        );
        override_parsed(
            &mut ingest.accept_backoff_ms,
            "LOGHAUL_INGEST_ACCEPT_BACKOFF_MS",
        );
        override_parsed(
            &mut ingest.shutdown_grace_secs,
            "LOGHAUL_INGEST_SHUTDOWN_GRACE_SECS",
        );

        // Queue
        override_parsed(&mut self.queue.capacity, "LOGHAUL_QUEUE_CAPACITY");
        override_string(&mut self.queue.backpressure, "LOGHAUL_QUEUE_BACKPRESSURE");
        override_parsed(&mut self.queue.push_timeout_ms, "LOGHAUL_QUEUE_PUSH_TIMEOUT_MS");

        // Metrics
        override_parsed(&mut self.metrics.enabled, "LOGHAUL_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "LOGHAUL_METRICS_LISTEN_ADDR");
        override_parsed(&mut self.metrics.port, "LOGHAUL_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LoghaulError> {
        one_of("general.log_level", &self.general.log_level, &VALID_LOG_LEVELS)?;
        one_of("general.log_format", &self.general.log_format, &VALID_LOG_FORMATS)?;

        let ingest = &self.ingest;
        if ingest.bind_address.trim().is_empty() {
            return Err(invalid("ingest.bind_address", "must not be empty"));
        }
        if ingest.backlog == 0 {
            return Err(invalid("ingest.backlog", "must be greater than 0"));
        }
        if ingest.max_connections == 0 {
            return Err(invalid("ingest.max_connections", "must be greater than 0"));
        }
        if ingest.read_timeout_secs == 0 {
            return Err(invalid("ingest.read_timeout_secs", "must be greater than 0"));
        }
        if ingest.max_record_size == 0 || ingest.max_record_size > MAX_RECORD_SIZE_LIMIT {
            return Err(invalid(
                "ingest.max_record_size",
                format!("must be 1-{MAX_RECORD_SIZE_LIMIT}"),
            ));
        }
        if ingest.recv_buffer_size == 0 {
            return Err(invalid("ingest.recv_buffer_size", "must be greater than 0"));
        }
        one_of("ingest.framing", &ingest.framing, &VALID_FRAMINGS)?;
        one_of(
            "ingest.decode_error_policy",
            &ingest.decode_error_policy,
            &VALID_DECODE_ERROR_POLICIES,
        )?;

        if self.queue.capacity == 0 || self.queue.capacity > MAX_QUEUE_CAPACITY {
            return Err(invalid(
                "queue.capacity",
                format!("must be 1-{MAX_QUEUE_CAPACITY}"),
            ));
        }
        one_of("queue.backpressure", &self.queue.backpressure, &VALID_BACKPRESSURE)?;
        if self.queue.push_timeout_ms == 0 {
            return Err(invalid("queue.push_timeout_ms", "must be greater than 0"));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid(
                "metrics.port",
                "must be non-zero when metrics are enabled",
            ));
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 수신 리스너/워커 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// 바인드 주소 (IP 또는 호스트명)
    pub bind_address: String,
    /// 바인드 포트 (0이면 임시 포트)
    pub port: u16,
    /// listen backlog
    pub backlog: u32,
    /// 최대 동시 연결 수
    pub max_connections: usize,
    /// 레코드 하나를 기다리는 최대 시간 (초)
    pub read_timeout_secs: u64,
    /// 레코드 최대 크기 (바이트)
    pub max_record_size: usize,
    /// 연결당 수신 버퍼 초기 크기 (바이트)
    pub recv_buffer_size: usize,
    /// 프레이밍 방식 (tagged, newline, octet-counting)
    pub framing: String,
    /// 디코드 에러 정책 (drop, terminate)
    pub decode_error_policy: String,
    /// 일시적 accept 실패 후 대기 시간 (밀리초)
    pub accept_backoff_ms: u64,
    /// 종료 시 워커 대기 시간 (초)
    pub shutdown_grace_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_owned(),
            port: 5140,
            backlog: 99,
            max_connections: 256,
            read_timeout_secs: 300,
            max_record_size: 1024 * 1024, // 1MB
            recv_buffer_size: 64 * 1024,  // 64KB
            framing: "tagged".to_owned(),
            decode_error_policy: "terminate".to_owned(),
            accept_backoff_ms: 50,
            shutdown_grace_secs: 5,
        }
    }
}

/// 공유 큐 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// 큐 최대 용량 (레코드 수)
    pub capacity: usize,
    /// 큐가 가득 찼을 때 동작 (wait, reject)
    pub backpressure: String,
    /// wait 모드에서 push 최대 대기 시간 (밀리초)
    pub push_timeout_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            backpressure: "wait".to_owned(),
            push_timeout_ms: 5_000,
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 메트릭 엔드포인트 활성화 여부
    pub enabled: bool,
    /// 리스닝 주소
    pub listen_addr: String,
    /// 리스닝 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
        }
    }
}

// --- 검증 헬퍼 ---

fn invalid(field: &str, reason: impl Into<String>) -> LoghaulError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

fn one_of(field: &str, value: &str, allowed: &[&str]) -> Result<(), LoghaulError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, format!("must be one of: {}", allowed.join(", "))))
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T>(target: &mut T, env_key: &str)
where
    T: FromStr,
    T::Err: Display,
{
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(e) => warn!(
                env_key,
                value = val.as_str(),
                error = %e,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

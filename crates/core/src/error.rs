//! 에러 타입 -- 도메인별 에러 정의

/// loghaul 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LoghaulError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 생명주기/처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline not running")]
    NotRunning,

    /// 파이프라인 초기화 실패 (바인드 실패 등)
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 실행 중 치명적 실패
    #[error("pipeline failed: {0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_to_top_level() {
        let err: LoghaulError = ConfigError::InvalidValue {
            field: "ingest.port".to_owned(),
            reason: "out of range".to_owned(),
        }
        .into();
        assert!(matches!(err, LoghaulError::Config(_)));
        assert!(err.to_string().contains("ingest.port"));
    }

    #[test]
    fn pipeline_error_display() {
        let err: LoghaulError = PipelineError::InitFailed("address in use".to_owned()).into();
        assert!(err.to_string().contains("address in use"));
    }
}

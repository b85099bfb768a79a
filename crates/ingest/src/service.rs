//! 수신 서비스 -- 리스너 생명주기를 core의 [`Pipeline`] trait으로 감쌉니다.
//!
//! [`IngestService`]는 `loghaul-daemon`에서 start/stop/health_check로 관리됩니다.
//!
//! ```text
//! IngestServiceBuilder::build() → (IngestService, QueueConsumer)
//! start() → bind + run() 태스크 생성
//! stop()  → 취소 후 ListenerReport 회수
//! ```
//!
//! # 사용 예시
//! ```ignore
//! use loghaul_core::pipeline::Pipeline;
//! use loghaul_ingest::IngestServiceBuilder;
//!
//! let (mut service, mut consumer) = IngestServiceBuilder::new()
//!     .listener_config(listener_config)
//!     .build()?;
//! service.start().await?;
//! while let Some(record) = consumer.recv().await { /* ... */ }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use loghaul_core::config::LoghaulConfig;
use loghaul_core::error::{LoghaulError, PipelineError};
use loghaul_core::pipeline::{HealthStatus, Pipeline};

use crate::config::{ListenerConfig, SharedQueueConfig};
use crate::error::IngestError;
use crate::listener::{IngestListener, ListenerReport, ListenerStats};
use crate::observer::{IngestObserver, NoopObserver};
use crate::queue::{QueueConsumer, QueueProducer, shared_queue};

/// 큐 사용률이 이 값 이상이면 Degraded
const QUEUE_DEGRADED_THRESHOLD: f64 = 0.9;

/// 서비스 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServiceState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 수신 서비스
pub struct IngestService {
    listener_config: ListenerConfig,
    queue: QueueProducer,
    observer: Arc<dyn IngestObserver>,
    state: ServiceState,
    cancel: CancellationToken,
    task: Option<JoinHandle<Result<ListenerReport, IngestError>>>,
    local_addr: Option<SocketAddr>,
    stats: Option<Arc<ListenerStats>>,
    last_report: Option<ListenerReport>,
}

impl IngestService {
    /// 실제 바인드된 주소 (실행 중일 때만)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// 현재 상태 이름
    pub fn state_name(&self) -> &'static str {
        match self.state {
            ServiceState::Initialized => "initialized",
            ServiceState::Running => "running",
            ServiceState::Stopped => "stopped",
        }
    }

    /// 실행 중 리스너 통계
    pub fn stats(&self) -> Option<Arc<ListenerStats>> {
        self.stats.clone()
    }

    /// 마지막으로 정지했을 때의 리스너 보고서
    pub fn last_report(&self) -> Option<&ListenerReport> {
        self.last_report.as_ref()
    }

    /// 큐 생산자 핸들
    pub fn queue(&self) -> &QueueProducer {
        &self.queue
    }
}

impl Pipeline for IngestService {
    async fn start(&mut self) -> Result<(), LoghaulError> {
        if self.state == ServiceState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        tracing::info!(
            bind_address = %self.listener_config.bind_address,
            port = self.listener_config.port,
            "starting ingest service"
        );

        let cancel = CancellationToken::new();
        let listener = IngestListener::bind(
            self.listener_config.clone(),
            self.queue.clone(),
            cancel.clone(),
        )
        .await?
        .with_observer(Arc::clone(&self.observer));

        self.local_addr = listener.local_addr().ok();
        self.stats = Some(listener.stats());
        self.task = Some(tokio::spawn(listener.run()));
        self.cancel = cancel;
        self.state = ServiceState::Running;

        tracing::info!(addr = ?self.local_addr, "ingest service started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LoghaulError> {
        if self.state != ServiceState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        tracing::info!("stopping ingest service");
        self.cancel.cancel();
        self.state = ServiceState::Stopped;
        self.local_addr = None;

        let Some(task) = self.task.take() else {
            return Ok(());
        };
        let report = task
            .await
            .map_err(|e| PipelineError::Failed(format!("listener task failed: {e}")))??;

        tracing::info!(
            accepted = report.accepted,
            rejected = report.rejected,
            accept_errors = report.accept_errors,
            "ingest service stopped"
        );
        self.last_report = Some(report);
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            ServiceState::Running => {
                if self.task.as_ref().is_none_or(JoinHandle::is_finished) {
                    return HealthStatus::Unhealthy("listener task exited".to_owned());
                }
                let utilization = self.queue.utilization();
                if utilization >= QUEUE_DEGRADED_THRESHOLD {
                    HealthStatus::Degraded(format!(
                        "queue utilization high: {:.1}%",
                        utilization * 100.0
                    ))
                } else {
                    HealthStatus::Healthy
                }
            }
            ServiceState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            ServiceState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 수신 서비스 빌더
///
/// 서비스와 공유 큐를 함께 구성하고 소비자 핸들을 돌려줍니다.
pub struct IngestServiceBuilder {
    listener_config: ListenerConfig,
    queue_config: SharedQueueConfig,
    observer: Arc<dyn IngestObserver>,
}

impl IngestServiceBuilder {
    /// 기본 설정으로 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            listener_config: ListenerConfig::default(),
            queue_config: SharedQueueConfig::default(),
            observer: Arc::new(NoopObserver),
        }
    }

    /// `loghaul.toml` 설정에서 빌더를 생성합니다.
    pub fn from_config(config: &LoghaulConfig) -> Result<Self, IngestError> {
        Ok(Self::new()
            .listener_config(ListenerConfig::from_core(&config.ingest)?)
            .queue_config(SharedQueueConfig::from_core(&config.queue)?))
    }

    /// 리스너 설정을 지정합니다.
    pub fn listener_config(mut self, config: ListenerConfig) -> Self {
        self.listener_config = config;
        self
    }

    /// 큐 설정을 지정합니다.
    pub fn queue_config(mut self, config: SharedQueueConfig) -> Self {
        self.queue_config = config;
        self
    }

    /// 관찰자를 지정합니다.
    pub fn observer(mut self, observer: Arc<dyn IngestObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// 서비스를 빌드합니다.
    ///
    /// # Returns
    /// - `IngestService`: 서비스 인스턴스
    /// - `QueueConsumer`: 공유 큐 소비자 핸들
    pub fn build(self) -> Result<(IngestService, QueueConsumer), IngestError> {
        self.listener_config.validate()?;
        self.queue_config.validate()?;

        let (queue, consumer) = shared_queue(&self.queue_config);
        let service = IngestService {
            listener_config: self.listener_config,
            queue,
            observer: self.observer,
            state: ServiceState::Initialized,
            cancel: CancellationToken::new(),
            task: None,
            local_addr: None,
            stats: None,
            last_report: None,
        };
        Ok((service, consumer))
    }
}

impl Default for IngestServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

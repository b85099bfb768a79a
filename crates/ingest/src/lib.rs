//! loghaul 수신 계층
//!
//! 원격 producer의 TCP 연결을 받아 레코드를 디코딩하고 공유 큐에 넣습니다.
//!
//! # 모듈 구성
//!
//! - [`listener`]: 리스닝 소켓 바인드와 accept 루프
//! - [`worker`]: 연결 하나를 담당하는 디코드/enqueue 워커
//! - [`queue`]: 워커(생산자)와 하위 소비자 사이의 공유 큐
//! - [`codec`]: `<rec>` 태그, 개행, octet-counting 프레이밍 코덱
//! - [`record`]: 큐로 전달되는 레코드 타입
//! - [`observer`]: 비치명적 에러를 타입으로 받는 관찰자 trait
//! - [`service`]: core `Pipeline` trait 구현
//! - [`config`]: 수신 계층 설정 (core 설정 변환)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! IngestListener --accept--> ConnectionWorker (연결당 1 태스크)
//!                                  |
//!                            RecordCodec -> QueueProducer --> QueueConsumer -> downstream
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod listener;
pub mod observer;
pub mod queue;
pub mod record;
pub mod service;
pub mod worker;

// --- 주요 타입 re-export ---

// 서비스
pub use service::{IngestService, IngestServiceBuilder};

// 리스너 / 워커
pub use listener::{Acceptor, IngestListener, ListenerReport, ListenerStats};
pub use worker::{CloseReason, ConnectionOutcome, ConnectionSummary, ConnectionWorker};

// 큐
pub use queue::{QueueConsumer, QueueProducer, shared_queue};
pub use record::LogRecord;

// 코덱
pub use codec::{Frame, RecordCodec, RecordDecoder};

// 관찰자
pub use observer::{IngestObserver, NoopObserver};

// 설정
pub use config::{
    Backpressure, DecodeErrorPolicy, Framing, ListenerConfig, ListenerConfigBuilder,
    SharedQueueConfig, WorkerConfig,
};

// 에러
pub use error::{DecodeError, FrameError, IngestError, QueueError};

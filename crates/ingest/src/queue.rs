//! 공유 큐 -- 연결 워커(생산자)와 하위 소비자 사이의 전달 구조
//!
//! 용량이 제한된 `tokio::sync::mpsc` 채널 위에 구축됩니다.
//! [`QueueProducer`]는 워커마다 복제되고 [`QueueConsumer`]는 하나만 존재합니다.
//!
//! # 백프레셔
//! 큐가 가득 찬 경우:
//! - [`Backpressure::Wait`]: `push_timeout`까지 공간을 기다린 뒤 [`QueueError::Timeout`]
//! - [`Backpressure::Reject`]: 즉시 [`QueueError::Full`]
//!
//! 어떤 경우에도 레코드를 조용히 버리지 않습니다. push 실패는 항상 호출자에게
//! 반환되고 `loghaul_queue_push_failures_total`에 집계됩니다.

use std::time::Duration;

use metrics::{counter, gauge};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendTimeoutError, TryRecvError, TrySendError};

use loghaul_core::metrics as m;

use crate::config::{Backpressure, SharedQueueConfig};
use crate::error::QueueError;
use crate::record::LogRecord;

/// 공유 큐를 생성합니다.
///
/// 설정은 [`SharedQueueConfig::validate`]를 통과한 값이어야 합니다
/// (용량 0은 1로 보정).
pub fn shared_queue(config: &SharedQueueConfig) -> (QueueProducer, QueueConsumer) {
    let capacity = config.capacity.max(1);
    let (tx, rx) = mpsc::channel(capacity);
    let producer = QueueProducer {
        tx,
        capacity,
        backpressure: config.backpressure,
        push_timeout: config.push_timeout,
    };
    let consumer = QueueConsumer { rx, capacity };
    (producer, consumer)
}

/// 큐 생산자 핸들 (워커별로 복제)
#[derive(Debug, Clone)]
pub struct QueueProducer {
    tx: mpsc::Sender<LogRecord>,
    capacity: usize,
    backpressure: Backpressure,
    push_timeout: Duration,
}

impl QueueProducer {
    /// 레코드 하나를 큐에 넣습니다.
    ///
    /// 성공하면 레코드는 정확히 한 번 큐에 들어갑니다. 실패하면 레코드는
    /// 큐에 들어가지 않으며 에러로 보고됩니다.
    pub async fn push(&self, record: LogRecord) -> Result<(), QueueError> {
        let result = match self.backpressure {
            Backpressure::Wait => self
                .tx
                .send_timeout(record, self.push_timeout)
                .await
                .map_err(|e| match e {
                    SendTimeoutError::Timeout(_) => QueueError::Timeout {
                        waited: self.push_timeout,
                    },
                    SendTimeoutError::Closed(_) => QueueError::Closed,
                }),
            Backpressure::Reject => self.tx.try_send(record).map_err(|e| match e {
                TrySendError::Full(_) => QueueError::Full {
                    capacity: self.capacity,
                },
                TrySendError::Closed(_) => QueueError::Closed,
            }),
        };

        match &result {
            Ok(()) => counter!(m::QUEUE_RECORDS_PUSHED_TOTAL).increment(1),
            Err(e) => counter!(m::QUEUE_PUSH_FAILURES_TOTAL, m::LABEL_REASON => e.reason())
                .increment(1),
        }
        gauge!(m::QUEUE_DEPTH).set(self.len() as f64);
        result
    }

    /// 큐 용량
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 현재 큐에 쌓인 레코드 수
    pub fn len(&self) -> usize {
        self.capacity.saturating_sub(self.tx.capacity())
    }

    /// 큐가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 소비자가 큐를 닫았거나 drop했는지 확인합니다.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// 큐 사용률 (0.0~1.0)
    pub fn utilization(&self) -> f64 {
        f64::from(u32::try_from(self.len()).unwrap_or(u32::MAX))
            / f64::from(u32::try_from(self.capacity).unwrap_or(u32::MAX))
    }
}

/// 큐 소비자 핸들
#[derive(Debug)]
pub struct QueueConsumer {
    rx: mpsc::Receiver<LogRecord>,
    capacity: usize,
}

impl QueueConsumer {
    /// 다음 레코드를 기다립니다.
    ///
    /// 모든 생산자가 drop되고 큐가 비면 `None`을 반환합니다.
    pub async fn recv(&mut self) -> Option<LogRecord> {
        let record = self.rx.recv().await;
        if record.is_some() {
            self.record_popped(1);
        }
        record
    }

    /// 대기 없이 레코드 하나를 꺼냅니다.
    pub fn try_recv(&mut self) -> Option<LogRecord> {
        match self.rx.try_recv() {
            Ok(record) => {
                self.record_popped(1);
                Some(record)
            }
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// 대기 없이 최대 `max`개의 레코드를 꺼냅니다.
    pub fn drain(&mut self, max: usize) -> Vec<LogRecord> {
        let mut batch = Vec::with_capacity(max.min(self.rx.len()));
        while batch.len() < max {
            match self.rx.try_recv() {
                Ok(record) => batch.push(record),
                Err(_) => break,
            }
        }
        self.record_popped(batch.len());
        batch
    }

    /// 레코드가 하나 이상 도착할 때까지 기다린 뒤 최대 `max`개를 꺼냅니다.
    ///
    /// 빈 Vec은 큐가 닫히고 비었음을 의미합니다.
    pub async fn recv_batch(&mut self, max: usize) -> Vec<LogRecord> {
        let mut batch = Vec::with_capacity(max.min(self.capacity));
        if max == 0 {
            return batch;
        }
        self.rx.recv_many(&mut batch, max).await;
        self.record_popped(batch.len());
        batch
    }

    /// 현재 큐에 쌓인 레코드 수
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// 큐가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// 큐 용량
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 큐를 닫습니다.
    ///
    /// 이후 push는 [`QueueError::Closed`]로 실패하며, 이미 들어간 레코드는
    /// 계속 꺼낼 수 있습니다.
    pub fn close(&mut self) {
        self.rx.close();
    }

    fn record_popped(&self, n: usize) {
        if n == 0 {
            return;
        }
        counter!(m::QUEUE_RECORDS_POPPED_TOTAL).increment(n as u64);
        gauge!(m::QUEUE_DEPTH).set(self.rx.len() as f64);
    }
}

//! 연결 워커 -- 연결 하나의 바이트 스트림을 레코드로 바꿔 공유 큐에 넣습니다.
//!
//! 워커는 연결을 독점하며, 다음 중 하나가 일어날 때까지 동작합니다:
//! - 원격이 연결을 닫음 (EOF)
//! - 읽기 I/O 에러, 프레임 동기화 상실
//! - 디코드 에러 (terminate 정책)
//! - 읽기 타임아웃 (다음 레코드를 `read_timeout` 동안 받지 못함)
//! - 큐 push 실패
//! - 종료 신호 (CancellationToken)
//!
//! 연결 수준 실패는 [`ConnectionOutcome`]으로 반환되며 리스너나 다른 워커로
//! 전파되지 않습니다. 디코딩된 레코드는 순서대로 정확히 한 번 push됩니다.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::StreamExt;
use metrics::counter;
use tokio::io::AsyncRead;
use tokio::time::timeout;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use loghaul_core::metrics as m;

use crate::codec::{Frame, RecordCodec, RecordDecoder};
use crate::config::{DecodeErrorPolicy, WorkerConfig};
use crate::error::{FrameError, IngestError};
use crate::observer::{IngestObserver, NoopObserver};
use crate::queue::QueueProducer;
use crate::record::LogRecord;

/// 연결 종료 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// 원격이 연결을 닫음
    Eof,
    /// 읽기 I/O 에러
    Io,
    /// 디코드 에러 (terminate 정책)
    Decode,
    /// 프레임 동기화 상실
    Framing,
    /// 읽기 타임아웃
    Timeout,
    /// 큐 push 실패
    Queue,
    /// 종료 신호
    Shutdown,
}

impl CloseReason {
    /// 메트릭 레이블 값
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eof => "eof",
            Self::Io => "io",
            Self::Decode => "decode",
            Self::Framing => "framing",
            Self::Timeout => "timeout",
            Self::Queue => "queue",
            Self::Shutdown => "shutdown",
        }
    }

    /// 에러 없이 끝났는지 여부
    pub fn is_graceful(&self) -> bool {
        matches!(self, Self::Eof | Self::Shutdown)
    }
}

/// 연결 하나의 처리 결과 요약
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSummary {
    /// 연결 ID
    pub connection_id: u64,
    /// 원격 주소
    pub peer: SocketAddr,
    /// 큐에 넣은 레코드 수
    pub records: u64,
    /// 잘못된 단위 수
    pub malformed: u64,
    /// EOF 시 버려진 미완성 단위 크기 (바이트)
    pub discarded_tail_bytes: usize,
    /// 종료 사유
    pub close_reason: CloseReason,
}

/// [`ConnectionWorker::serve`]의 반환값
#[derive(Debug)]
pub struct ConnectionOutcome {
    /// 처리 요약
    pub summary: ConnectionSummary,
    /// 연결을 끝낸 에러 (정상 종료면 `None`)
    pub error: Option<IngestError>,
}

impl ConnectionOutcome {
    /// 에러가 있으면 `Err`로 변환합니다.
    pub fn into_result(self) -> Result<ConnectionSummary, IngestError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.summary),
        }
    }
}

/// 연결 워커
pub struct ConnectionWorker<S, D = RecordCodec> {
    connection_id: u64,
    peer: SocketAddr,
    framed: FramedRead<S, D>,
    queue: QueueProducer,
    config: WorkerConfig,
    cancel: CancellationToken,
    observer: Arc<dyn IngestObserver>,
}

impl<S> ConnectionWorker<S, RecordCodec>
where
    S: AsyncRead + Unpin + Send,
{
    /// 설정된 프레이밍의 코덱으로 워커를 생성합니다.
    pub fn new(
        connection_id: u64,
        peer: SocketAddr,
        stream: S,
        queue: QueueProducer,
        config: WorkerConfig,
        cancel: CancellationToken,
    ) -> Self {
        let codec = RecordCodec::new(config.framing, config.max_record_size);
        Self::with_codec(connection_id, peer, stream, codec, queue, config, cancel)
    }
}

impl<S, D> ConnectionWorker<S, D>
where
    S: AsyncRead + Unpin + Send,
    D: RecordDecoder,
{
    /// 임의의 [`RecordDecoder`]로 워커를 생성합니다.
    pub fn with_codec(
        connection_id: u64,
        peer: SocketAddr,
        stream: S,
        codec: D,
        queue: QueueProducer,
        config: WorkerConfig,
        cancel: CancellationToken,
    ) -> Self {
        let framed = FramedRead::with_capacity(stream, codec, config.recv_buffer_size);
        Self {
            connection_id,
            peer,
            framed,
            queue,
            config,
            cancel,
            observer: Arc::new(NoopObserver),
        }
    }

    /// 관찰자를 설정합니다.
    pub fn with_observer(mut self, observer: Arc<dyn IngestObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// 연결이 끝날 때까지 레코드를 디코딩해 큐에 넣습니다.
    pub async fn serve(mut self) -> ConnectionOutcome {
        let framing = self.framed.decoder().framing();
        let mut records: u64 = 0;
        let mut malformed: u64 = 0;

        debug!(
            connection_id = self.connection_id,
            peer = %self.peer,
            framing,
            "connection worker started"
        );

        let (close_reason, error) = loop {
            let step = tokio::select! {
                biased;
                () = self.cancel.cancelled() => None,
                next = timeout(self.config.read_timeout, self.framed.next()) => Some(next),
            };

            let next = match step {
                None => break (CloseReason::Shutdown, None),
                Some(Err(_elapsed)) => {
                    break (
                        CloseReason::Timeout,
                        Some(IngestError::ReadTimeout {
                            peer: self.peer,
                            timeout: self.config.read_timeout,
                        }),
                    );
                }
                Some(Ok(next)) => next,
            };

            match next {
                None => break (CloseReason::Eof, None),
                Some(Err(FrameError::Io(source))) => {
                    break (
                        CloseReason::Io,
                        Some(IngestError::ConnectionIo {
                            peer: self.peer,
                            source,
                        }),
                    );
                }
                Some(Err(FrameError::Desync { reason })) => {
                    break (
                        CloseReason::Framing,
                        Some(IngestError::Framing {
                            peer: self.peer,
                            reason,
                        }),
                    );
                }
                Some(Ok(Frame::Record(payload))) => {
                    let record = LogRecord::new(payload, self.peer, self.connection_id, records);
                    if let Err(e) = self.queue.push(record).await {
                        break (CloseReason::Queue, Some(IngestError::Queue(e)));
                    }
                    records += 1;
                    counter!(m::INGEST_RECORDS_DECODED_TOTAL, m::LABEL_FRAMING => framing)
                        .increment(1);
                }
                Some(Ok(Frame::Malformed(source))) => {
                    malformed += 1;
                    counter!(m::INGEST_DECODE_ERRORS_TOTAL, m::LABEL_FRAMING => framing)
                        .increment(1);
                    self.observer.on_decode_error(self.peer, &source);

                    match self.config.decode_error_policy {
                        DecodeErrorPolicy::Drop => {
                            debug!(
                                connection_id = self.connection_id,
                                peer = %self.peer,
                                error = %source,
                                "dropped malformed unit"
                            );
                        }
                        DecodeErrorPolicy::Terminate => {
                            break (
                                CloseReason::Decode,
                                Some(IngestError::Decode {
                                    peer: self.peer,
                                    source,
                                }),
                            );
                        }
                    }
                }
            }
        };

        let summary = ConnectionSummary {
            connection_id: self.connection_id,
            peer: self.peer,
            records,
            malformed,
            discarded_tail_bytes: self.framed.decoder().discarded_tail(),
            close_reason,
        };

        counter!(m::INGEST_CONNECTIONS_CLOSED_TOTAL, m::LABEL_REASON => close_reason.as_str())
            .increment(1);

        match &error {
            None => info!(
                connection_id = summary.connection_id,
                peer = %summary.peer,
                records = summary.records,
                malformed = summary.malformed,
                discarded_tail_bytes = summary.discarded_tail_bytes,
                reason = close_reason.as_str(),
                "connection closed"
            ),
            Some(e) => warn!(
                connection_id = summary.connection_id,
                peer = %summary.peer,
                records = summary.records,
                malformed = summary.malformed,
                reason = close_reason.as_str(),
                error = %e,
                "connection terminated"
            ),
        }

        self.observer.on_connection_closed(&summary, error.as_ref());
        ConnectionOutcome { summary, error }
    }
}

//! 수신 리스너 -- 리스닝 소켓과 accept 루프
//!
//! [`IngestListener::bind`]로 소켓을 바인드하고 [`IngestListener::run`]으로
//! accept 루프를 실행합니다. 수락된 연결마다 [`ConnectionWorker`] 태스크를
//! 생성하고 즉시 다음 accept로 돌아갑니다.
//!
//! # 에러 처리
//! - 바인드 실패: [`IngestError::Bind`] (치명적)
//! - 일시적 accept 실패: 로그, 메트릭, 관찰자 호출 후 `accept_backoff`만큼 대기하고 계속
//! - 리스닝 소켓 자체의 실패: [`IngestError::Listener`]로 루프 종료
//!
//! # 종료
//! CancellationToken이 취소되면 accept를 멈추고 소켓을 닫은 뒤, 워커들이
//! 끝나기를 `shutdown_grace`까지 기다립니다. 워커는 자식 토큰을 받으므로
//! 같은 신호로 함께 종료됩니다.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use metrics::{counter, gauge};
use tokio::io::AsyncRead;
use tokio::net::{TcpListener, TcpSocket, TcpStream, lookup_host};
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use loghaul_core::metrics as m;

use crate::config::ListenerConfig;
use crate::error::IngestError;
use crate::observer::{IngestObserver, NoopObserver};
use crate::queue::QueueProducer;
use crate::worker::ConnectionWorker;

/// 연결 수락 추상화
///
/// 실제 운영에서는 [`TcpListener`]를 사용하고, 테스트에서는 일시적 실패를
/// 주입하는 구현을 사용할 수 있습니다.
pub trait Acceptor: Send + 'static {
    /// 수락된 연결의 스트림 타입
    type Stream: AsyncRead + Unpin + Send + 'static;

    /// 다음 연결을 수락합니다.
    fn accept(&mut self) -> impl Future<Output = io::Result<(Self::Stream, SocketAddr)>> + Send;

    /// 바인드된 로컬 주소
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

impl Acceptor for TcpListener {
    type Stream = TcpStream;

    fn accept(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpListener::local_addr(self)
    }
}

/// 리스닝 소켓 자체가 더 이상 쓸 수 없는 accept 에러인지 판별합니다.
///
/// 그 외 에러(연결 중단, fd 고갈, 일시적 권한 거부 등)는 일시적으로 취급합니다.
fn is_fatal_accept_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::InvalidInput | io::ErrorKind::NotConnected | io::ErrorKind::Unsupported
    )
}

/// 실행 중 리스너 통계 (lock-free)
#[derive(Debug, Default)]
pub struct ListenerStats {
    accepted: AtomicU64,
    rejected: AtomicU64,
    accept_errors: AtomicU64,
    active: AtomicUsize,
}

impl ListenerStats {
    /// 수락된 연결 수
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// 연결 수 제한으로 거부된 연결 수
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// 일시적 accept 실패 수
    pub fn accept_errors(&self) -> u64 {
        self.accept_errors.load(Ordering::Relaxed)
    }

    /// 현재 동작 중인 워커 수
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }
}

/// [`IngestListener::run`] 종료 시 보고서
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerReport {
    /// 바인드됐던 주소
    pub local_addr: Option<SocketAddr>,
    /// 수락된 연결 수
    pub accepted: u64,
    /// 거부된 연결 수
    pub rejected: u64,
    /// 일시적 accept 실패 수
    pub accept_errors: u64,
    /// 유예 시간 안에 끝나지 않은 워커 수
    pub unfinished_workers: usize,
}

/// 수신 리스너
pub struct IngestListener<A: Acceptor = TcpListener> {
    acceptor: A,
    config: ListenerConfig,
    queue: QueueProducer,
    cancel: CancellationToken,
    observer: Arc<dyn IngestObserver>,
    stats: Arc<ListenerStats>,
    next_connection_id: u64,
}

impl IngestListener<TcpListener> {
    /// 설정된 주소와 backlog으로 리스닝 소켓을 바인드합니다.
    ///
    /// # Errors
    /// 설정이 잘못됐으면 [`IngestError::Config`], 주소를 쓸 수 없으면
    /// (사용 중, 권한 부족, 해석 불가) [`IngestError::Bind`].
    pub async fn bind(
        config: ListenerConfig,
        queue: QueueProducer,
        cancel: CancellationToken,
    ) -> Result<Self, IngestError> {
        config.validate()?;

        let display_addr = format!("{}:{}", config.bind_address, config.port);
        let bind_err = |source: io::Error| IngestError::Bind {
            addr: display_addr.clone(),
            source,
        };

        let addr = lookup_host((config.bind_address.as_str(), config.port))
            .await
            .map_err(bind_err)?
            .next()
            .ok_or_else(|| {
                bind_err(io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    "address did not resolve",
                ))
            })?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_err)?;
        #[cfg(unix)]
        socket.set_reuseaddr(true).map_err(bind_err)?;
        socket.bind(addr).map_err(bind_err)?;
        let listener = socket.listen(config.backlog).map_err(bind_err)?;

        info!(
            addr = %listener.local_addr().unwrap_or(addr),
            backlog = config.backlog,
            max_connections = config.max_connections,
            framing = %config.worker.framing,
            "ingest listener bound"
        );

        Ok(Self::from_acceptor(listener, config, queue, cancel))
    }
}

impl<A: Acceptor> IngestListener<A> {
    /// 이미 준비된 acceptor로 리스너를 생성합니다.
    pub fn from_acceptor(
        acceptor: A,
        config: ListenerConfig,
        queue: QueueProducer,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            acceptor,
            config,
            queue,
            cancel,
            observer: Arc::new(NoopObserver),
            stats: Arc::new(ListenerStats::default()),
            next_connection_id: 1,
        }
    }

    /// 관찰자를 설정합니다. 워커에도 같은 관찰자가 전달됩니다.
    pub fn with_observer(mut self, observer: Arc<dyn IngestObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// 바인드된 로컬 주소 (포트 0으로 바인드한 경우 실제 포트 확인용)
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.acceptor.local_addr()
    }

    /// 실행 중 통계 핸들
    pub fn stats(&self) -> Arc<ListenerStats> {
        Arc::clone(&self.stats)
    }

    /// accept 루프를 실행합니다.
    ///
    /// 취소 토큰이 취소되면 `Ok(ListenerReport)`, 리스닝 소켓이 쓸 수 없게 되면
    /// [`IngestError::Listener`]를 반환합니다. 개별 accept 실패와 연결 수준
    /// 에러로는 종료하지 않습니다.
    pub async fn run(mut self) -> Result<ListenerReport, IngestError> {
        let local_addr = self.acceptor.local_addr().ok();
        let limiter = Arc::new(Semaphore::new(self.config.max_connections));
        let tracker = TaskTracker::new();
        let workers_cancel = self.cancel.child_token();

        info!(addr = ?local_addr, "ingest listener accepting connections");

        let result = loop {
            let accepted = tokio::select! {
                biased;
                () = self.cancel.cancelled() => None,
                accepted = self.acceptor.accept() => Some(accepted),
            };

            match accepted {
                None => {
                    info!("ingest listener received shutdown signal");
                    break Ok(());
                }
                Some(Ok((stream, peer))) => {
                    self.dispatch(stream, peer, &limiter, &tracker, &workers_cancel);
                }
                Some(Err(e)) if is_fatal_accept_error(&e) => {
                    error!(error = %e, "listening socket failed, stopping accept loop");
                    break Err(IngestError::Listener(e));
                }
                Some(Err(e)) => {
                    self.stats.accept_errors.fetch_add(1, Ordering::Relaxed);
                    counter!(m::INGEST_ACCEPT_ERRORS_TOTAL).increment(1);
                    self.observer.on_accept_error(&e);
                    let err = IngestError::Accept(e);
                    warn!(
                        error = %err,
                        backoff_ms = self.config.accept_backoff.as_millis() as u64,
                        "transient accept failure, continuing"
                    );

                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => {}
                        () = sleep(self.config.accept_backoff) => {}
                    }
                }
            }
        };

        // 소켓을 먼저 닫아 새 연결이 backlog에 쌓이지 않게 함
        drop(self.acceptor);

        workers_cancel.cancel();
        tracker.close();
        if timeout(self.config.shutdown_grace, tracker.wait()).await.is_err() {
            warn!(
                unfinished = tracker.len(),
                grace_ms = self.config.shutdown_grace.as_millis() as u64,
                "workers did not finish within shutdown grace period"
            );
        }

        let report = ListenerReport {
            local_addr,
            accepted: self.stats.accepted(),
            rejected: self.stats.rejected(),
            accept_errors: self.stats.accept_errors(),
            unfinished_workers: tracker.len(),
        };
        info!(
            accepted = report.accepted,
            rejected = report.rejected,
            accept_errors = report.accept_errors,
            unfinished_workers = report.unfinished_workers,
            "ingest listener stopped"
        );

        result.map(|()| report)
    }

    /// 수락된 연결에 워커를 배정합니다. 워커 I/O를 기다리지 않습니다.
    fn dispatch(
        &mut self,
        stream: A::Stream,
        peer: SocketAddr,
        limiter: &Arc<Semaphore>,
        tracker: &TaskTracker,
        workers_cancel: &CancellationToken,
    ) {
        let Ok(permit) = Arc::clone(limiter).try_acquire_owned() else {
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            counter!(m::INGEST_CONNECTIONS_REJECTED_TOTAL).increment(1);
            warn!(
                peer = %peer,
                max_connections = self.config.max_connections,
                "max connections reached, rejecting connection"
            );
            self.observer.on_connection_rejected(peer);
            drop(stream);
            return;
        };

        let connection_id = self.next_connection_id;
        self.next_connection_id += 1;

        self.stats.accepted.fetch_add(1, Ordering::Relaxed);
        self.stats.active.fetch_add(1, Ordering::Relaxed);
        counter!(m::INGEST_CONNECTIONS_ACCEPTED_TOTAL).increment(1);
        gauge!(m::INGEST_ACTIVE_CONNECTIONS).increment(1.0);
        debug!(connection_id, peer = %peer, "accepted connection");

        let worker = ConnectionWorker::new(
            connection_id,
            peer,
            stream,
            self.queue.clone(),
            self.config.worker.clone(),
            workers_cancel.child_token(),
        )
        .with_observer(Arc::clone(&self.observer));
        let stats = Arc::clone(&self.stats);

        tracker.spawn(async move {
            worker.serve().await;
            stats.active.fetch_sub(1, Ordering::Relaxed);
            gauge!(m::INGEST_ACTIVE_CONNECTIONS).decrement(1.0);
            drop(permit); // 연결 종료 시 세마포어 반환
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncWriteExt, DuplexStream, duplex};
    use tokio::sync::mpsc;

    use super::*;
    use crate::config::SharedQueueConfig;
    use crate::queue::shared_queue;

    /// 테스트가 보낸 결과를 순서대로 돌려주는 acceptor
    struct ScriptedAcceptor {
        rx: mpsc::UnboundedReceiver<io::Result<(DuplexStream, SocketAddr)>>,
    }

    impl Acceptor for ScriptedAcceptor {
        type Stream = DuplexStream;

        async fn accept(&mut self) -> io::Result<(DuplexStream, SocketAddr)> {
            match self.rx.recv().await {
                Some(result) => result,
                // 스크립트가 끝나면 새 연결이 없는 리스너처럼 대기
                None => std::future::pending().await,
            }
        }

        fn local_addr(&self) -> io::Result<SocketAddr> {
            Ok("127.0.0.1:5140".parse().unwrap())
        }
    }

    fn scripted() -> (
        ScriptedAcceptor,
        mpsc::UnboundedSender<io::Result<(DuplexStream, SocketAddr)>>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ScriptedAcceptor { rx }, tx)
    }

    fn peer(port: u16) -> SocketAddr {
        SocketAddr::from(([192, 0, 2, 1], port))
    }

    fn listener_config() -> ListenerConfig {
        ListenerConfig::builder()
            .bind_address("127.0.0.1")
            .port(0)
            .accept_backoff(Duration::from_millis(1))
            .shutdown_grace(Duration::from_secs(1))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn transient_accept_error_does_not_stop_loop() {
        let (acceptor, script) = scripted();
        let (producer, mut consumer) = shared_queue(&SharedQueueConfig::default());
        let cancel = CancellationToken::new();
        let listener =
            IngestListener::from_acceptor(acceptor, listener_config(), producer, cancel.clone());
        let stats = listener.stats();
        let handle = tokio::spawn(listener.run());

        script
            .send(Err(io::Error::from(io::ErrorKind::ConnectionAborted)))
            .unwrap();
        let (mut client, server) = duplex(256);
        script.send(Ok((server, peer(1000)))).unwrap();
        client.write_all(b"<rec>after-error</rec>").await.unwrap();
        drop(client);

        let record = consumer.recv().await.unwrap();
        assert_eq!(record.payload_lossy(), "after-error");
        assert_eq!(record.connection_id, 1);
        assert_eq!(stats.accept_errors(), 1);

        cancel.cancel();
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.accepted, 1);
        assert_eq!(report.accept_errors, 1);
        assert_eq!(report.unfinished_workers, 0);
    }

    #[tokio::test]
    async fn fatal_accept_error_ends_run() {
        let (acceptor, script) = scripted();
        let (producer, _consumer) = shared_queue(&SharedQueueConfig::default());
        let listener = IngestListener::from_acceptor(
            acceptor,
            listener_config(),
            producer,
            CancellationToken::new(),
        );

        script
            .send(Err(io::Error::from(io::ErrorKind::InvalidInput)))
            .unwrap();
        let err = listener.run().await.unwrap_err();
        assert!(matches!(err, IngestError::Listener(_)));
    }

    #[tokio::test]
    async fn connection_ids_increase_per_accept() {
        let (acceptor, script) = scripted();
        let (producer, mut consumer) = shared_queue(&SharedQueueConfig::default());
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(
            IngestListener::from_acceptor(acceptor, listener_config(), producer, cancel.clone())
                .run(),
        );

        for port in [1001, 1002] {
            let (mut client, server) = duplex(256);
            script.send(Ok((server, peer(port)))).unwrap();
            client.write_all(b"<rec>x</rec>").await.unwrap();
            drop(client);
            let record = consumer.recv().await.unwrap();
            assert_eq!(record.peer, peer(port));
            assert_eq!(record.connection_id, u64::from(port - 1000));
        }

        cancel.cancel();
        assert_eq!(handle.await.unwrap().unwrap().accepted, 2);
    }

    #[tokio::test]
    async fn cancellation_stops_idle_workers() {
        let (acceptor, script) = scripted();
        let (producer, _consumer) = shared_queue(&SharedQueueConfig::default());
        let cancel = CancellationToken::new();
        let listener =
            IngestListener::from_acceptor(acceptor, listener_config(), producer, cancel.clone());
        let stats = listener.stats();
        let handle = tokio::spawn(listener.run());

        // 아무것도 보내지 않는 연결
        let (_client, server) = duplex(256);
        script.send(Ok((server, peer(2000)))).unwrap();
        while stats.active() == 0 {
            tokio::task::yield_now().await;
        }

        cancel.cancel();
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.unfinished_workers, 0);
        assert_eq!(stats.active(), 0);
    }

    #[tokio::test]
    async fn bind_reports_ephemeral_port() {
        let (producer, _consumer) = shared_queue(&SharedQueueConfig::default());
        let listener = IngestListener::bind(listener_config(), producer, CancellationToken::new())
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn bind_rejects_invalid_config() {
        let (producer, _consumer) = shared_queue(&SharedQueueConfig::default());
        let mut config = listener_config();
        config.backlog = 0;
        let err = IngestListener::bind(config, producer, CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, IngestError::Config { .. }));
    }

    #[test]
    fn fatal_accept_error_kinds() {
        assert!(is_fatal_accept_error(&io::Error::from(
            io::ErrorKind::InvalidInput
        )));
        assert!(!is_fatal_accept_error(&io::Error::from(
            io::ErrorKind::ConnectionAborted
        )));
        assert!(!is_fatal_accept_error(&io::Error::from(
            io::ErrorKind::PermissionDenied
        )));
    }
}

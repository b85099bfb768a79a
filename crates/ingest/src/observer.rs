//! 수신 이벤트 관찰자
//!
//! 리스너와 워커는 비치명적 에러를 로그로 남기고 계속 동작합니다.
//! [`IngestObserver`]를 등록하면 같은 에러를 타입이 있는 값으로 받을 수 있습니다.
//! 모든 메서드는 기본 구현이 no-op이므로 필요한 훅만 구현하면 됩니다.
//!
//! 훅은 accept 루프와 워커 태스크 안에서 동기적으로 호출되므로
//! 블로킹 작업을 하면 안 됩니다.

use std::io;
use std::net::SocketAddr;

use crate::error::{DecodeError, IngestError};
use crate::worker::ConnectionSummary;

/// 수신 이벤트 관찰자 trait
pub trait IngestObserver: Send + Sync + 'static {
    /// 일시적 accept 실패 (루프는 계속됨)
    fn on_accept_error(&self, _error: &io::Error) {}

    /// 연결 수 제한으로 거부된 연결
    fn on_connection_rejected(&self, _peer: SocketAddr) {}

    /// 잘못된 레코드 단위 (정책과 무관하게 호출)
    fn on_decode_error(&self, _peer: SocketAddr, _error: &DecodeError) {}

    /// 연결 종료. 정상 종료(EOF, shutdown)면 `error`는 `None`.
    fn on_connection_closed(&self, _summary: &ConnectionSummary, _error: Option<&IngestError>) {}
}

/// 아무것도 하지 않는 관찰자 (기본값)
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl IngestObserver for NoopObserver {}

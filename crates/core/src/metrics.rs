//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `loghaul_`
//! - 모듈명: `ingest_`, `queue_`, `daemon_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(loghaul_core::metrics::INGEST_RECORDS_DECODED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 연결 종료 사유 레이블 키 (eof, io, decode, framing, timeout, queue, shutdown)
pub const LABEL_REASON: &str = "reason";

/// 프레이밍 방식 레이블 키 (tagged, newline, octet-counting)
pub const LABEL_FRAMING: &str = "framing";

// ─── Ingest 메트릭 ──────────────────────────────────────────────────

/// Ingest: 수락된 연결 수 (counter)
pub const INGEST_CONNECTIONS_ACCEPTED_TOTAL: &str = "loghaul_ingest_connections_accepted_total";

/// Ingest: 연결 수 제한으로 거부된 연결 수 (counter)
pub const INGEST_CONNECTIONS_REJECTED_TOTAL: &str = "loghaul_ingest_connections_rejected_total";

/// Ingest: 일시적 accept 실패 수 (counter)
pub const INGEST_ACCEPT_ERRORS_TOTAL: &str = "loghaul_ingest_accept_errors_total";

/// Ingest: 현재 활성 연결 수 (gauge)
pub const INGEST_ACTIVE_CONNECTIONS: &str = "loghaul_ingest_active_connections";

/// Ingest: 연결 종료 수 (counter, label: reason)
pub const INGEST_CONNECTIONS_CLOSED_TOTAL: &str = "loghaul_ingest_connections_closed_total";

/// Ingest: 디코딩된 레코드 수 (counter, label: framing)
pub const INGEST_RECORDS_DECODED_TOTAL: &str = "loghaul_ingest_records_decoded_total";

/// Ingest: 디코드 실패 단위 수 (counter, label: framing)
pub const INGEST_DECODE_ERRORS_TOTAL: &str = "loghaul_ingest_decode_errors_total";

// ─── Queue 메트릭 ───────────────────────────────────────────────────

/// Queue: 큐에 들어간 레코드 수 (counter)
pub const QUEUE_RECORDS_PUSHED_TOTAL: &str = "loghaul_queue_records_pushed_total";

/// Queue: 소비자가 꺼낸 레코드 수 (counter)
pub const QUEUE_RECORDS_POPPED_TOTAL: &str = "loghaul_queue_records_popped_total";

/// Queue: push 실패 수 (counter, label: reason)
pub const QUEUE_PUSH_FAILURES_TOTAL: &str = "loghaul_queue_push_failures_total";

/// Queue: 현재 큐 깊이 (gauge)
pub const QUEUE_DEPTH: &str = "loghaul_queue_depth";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "loghaul_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "loghaul_daemon_build_info";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    // Ingest
    describe_counter!(
        INGEST_CONNECTIONS_ACCEPTED_TOTAL,
        "Total number of accepted producer connections"
    );
    describe_counter!(
        INGEST_CONNECTIONS_REJECTED_TOTAL,
        "Connections rejected because max_connections was reached"
    );
    describe_counter!(
        INGEST_ACCEPT_ERRORS_TOTAL,
        "Transient accept failures (the listener kept running)"
    );
    describe_gauge!(
        INGEST_ACTIVE_CONNECTIONS,
        "Number of connection workers currently serving"
    );
    describe_counter!(
        INGEST_CONNECTIONS_CLOSED_TOTAL,
        "Closed connections by close reason"
    );
    describe_counter!(
        INGEST_RECORDS_DECODED_TOTAL,
        "Records successfully decoded from producer streams"
    );
    describe_counter!(
        INGEST_DECODE_ERRORS_TOTAL,
        "Malformed units encountered while decoding"
    );

    // Queue
    describe_counter!(
        QUEUE_RECORDS_PUSHED_TOTAL,
        "Records handed to the shared queue"
    );
    describe_counter!(
        QUEUE_RECORDS_POPPED_TOTAL,
        "Records taken from the shared queue by the consumer"
    );
    describe_counter!(
        QUEUE_PUSH_FAILURES_TOTAL,
        "Pushes refused by the shared queue (full, timeout, closed)"
    );
    describe_gauge!(QUEUE_DEPTH, "Records currently waiting in the shared queue");

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "Daemon uptime in seconds");
    describe_gauge!(DAEMON_BUILD_INFO, "Build information (always 1)");
}

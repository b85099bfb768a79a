//! 레코드 코덱 벤치마크
//!
//! 프레이밍별 디코딩 처리량과 읽기 조각 크기의 영향을 측정합니다.

use bytes::BytesMut;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use tokio_util::codec::Decoder;

use loghaul_ingest::{Frame, Framing, RecordCodec};

/// 짧은 애플리케이션 로그 한 줄
const SHORT: &str = "2024-01-15T12:00:00Z web-01 nginx: request processed in 12ms";

/// 긴 로그 (스택 트레이스 일부 포함)
const LONG: &str = "2024-01-15T12:00:00.123456Z production-api-07 payments[4411]: unhandled error while settling batch 0x5f2a: connection reset by peer; retry 3/5 scheduled in 800ms; at settle_batch (ledger.rs:812) at process_queue (worker.rs:144) at run (main.rs:77) request_id=550e8400-e29b-41d4-a716-446655440000";

fn encode(framing: Framing, payload: &str, count: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity((payload.len() + 16) * count);
    for _ in 0..count {
        match framing {
            Framing::Tagged => {
                out.extend_from_slice(b"<rec>");
                out.extend_from_slice(payload.as_bytes());
                out.extend_from_slice(b"</rec>\n");
            }
            Framing::Newline => {
                out.extend_from_slice(payload.as_bytes());
                out.push(b'\n');
            }
            Framing::OctetCounting => {
                out.extend_from_slice(format!("{} ", payload.len()).as_bytes());
                out.extend_from_slice(payload.as_bytes());
            }
        }
    }
    out
}

/// 입력을 `chunk` 크기로 나눠 공급하며 레코드 수를 셉니다.
fn decode_count(framing: Framing, input: &[u8], chunk: usize) -> usize {
    let mut codec = RecordCodec::new(framing, 64 * 1024);
    let mut buf = BytesMut::with_capacity(chunk * 2);
    let mut records = 0;
    for piece in input.chunks(chunk) {
        buf.extend_from_slice(piece);
        while let Ok(Some(frame)) = codec.decode(&mut buf) {
            if matches!(frame, Frame::Record(_)) {
                records += 1;
            }
        }
    }
    records
}

const FRAMINGS: [Framing; 3] = [Framing::Tagged, Framing::Newline, Framing::OctetCounting];

fn bench_framing(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_1000_records");
    group.throughput(Throughput::Elements(1000));

    for framing in FRAMINGS {
        let short = encode(framing, SHORT, 1000);
        group.bench_with_input(BenchmarkId::new("short", framing), &short, |b, input| {
            b.iter(|| decode_count(framing, black_box(input), 8 * 1024))
        });

        let long = encode(framing, LONG, 1000);
        group.bench_with_input(BenchmarkId::new("long", framing), &long, |b, input| {
            b.iter(|| decode_count(framing, black_box(input), 8 * 1024))
        });
    }

    group.finish();
}

fn bench_chunk_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("tagged_chunk_size");
    let input = encode(Framing::Tagged, SHORT, 1000);
    group.throughput(Throughput::Bytes(input.len() as u64));

    // 작은 조각은 태그 경계 재탐색 비용을 드러냄
    for chunk in [16usize, 256, 4096, 65536] {
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &chunk, |b, &chunk| {
            b.iter(|| decode_count(Framing::Tagged, black_box(&input), chunk))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_framing, bench_chunk_size);
criterion_main!(benches);

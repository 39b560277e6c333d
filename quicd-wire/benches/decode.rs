//! Benchmarks for the datagram decode path.
//!
//! These benchmarks measure:
//! - Header decoding (long and short form)
//! - Full packet decode with payload copy
//! - Frame parsing over a mixed payload
//! - Pool acquire/release cycles
//!
//! Run with: cargo bench -p quicd-wire --bench decode

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use quicd_wire::{
    decode_header, decode_packet, decode_packet_into, encode_frames, parse_frames, AckFrame,
    BufferPool, Frame, ObjectPool, Packet, StreamFrame,
};

fn long_header_datagram(payload: &[u8]) -> Vec<u8> {
    let mut d = vec![
        0xc1, 0x00, 0x00, 0x00, 0x01, // first byte + version
        0x08, 1, 2, 3, 4, 5, 6, 7, 8, // DCID
        0x08, 8, 7, 6, 5, 4, 3, 2, 1, // SCID
        0x00, // token length
    ];
    let len = payload.len() + 2;
    d.push(0x40 | (len >> 8) as u8);
    d.push(len as u8);
    d.extend_from_slice(&[0x12, 0x34]);
    d.extend_from_slice(payload);
    d
}

fn mixed_payload(stream_data: usize) -> Vec<u8> {
    let frames = vec![
        Frame::Ack(AckFrame {
            largest_acknowledged: 4096,
        }),
        Frame::Stream(StreamFrame {
            stream_id: 4,
            offset: 1200,
            data: vec![0xab; stream_data].into(),
            fin: false,
        }),
        Frame::Padding,
        Frame::Padding,
    ];
    let mut buf = vec![0u8; stream_data + 64];
    let n = encode_frames(&frames, &mut buf).unwrap();
    buf.truncate(n);
    buf
}

/// Benchmark header decoding for both forms
fn bench_decode_header(c: &mut Criterion) {
    let long = long_header_datagram(&[0u8; 32]);
    let short = [0x41u8, 0x12, 0x34, 0x00];

    c.bench_function("decode_header_long", |b| {
        b.iter(|| black_box(decode_header(black_box(&long)).unwrap()))
    });
    c.bench_function("decode_header_short", |b| {
        b.iter(|| black_box(decode_header(black_box(&short)).unwrap()))
    });
}

/// Benchmark full packet decode at several payload sizes
fn bench_decode_packet(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_packet");

    for size in [64usize, 512, 1200] {
        let datagram = long_header_datagram(&mixed_payload(size));
        group.throughput(Throughput::Bytes(datagram.len() as u64));

        group.bench_with_input(BenchmarkId::new("fresh", size), &datagram, |b, d| {
            b.iter(|| black_box(decode_packet(black_box(d)).unwrap()))
        });

        let pool: ObjectPool<Packet> = ObjectPool::new(16);
        group.bench_with_input(BenchmarkId::new("pooled", size), &datagram, |b, d| {
            b.iter(|| {
                let mut packet = pool.acquire();
                decode_packet_into(black_box(d), &mut packet).unwrap();
                black_box(&packet);
                pool.release(packet);
            })
        });
    }

    group.finish();
}

/// Benchmark frame parsing over a mixed payload
fn bench_parse_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_frames");

    for size in [64usize, 1200] {
        let payload = mixed_payload(size);
        group.throughput(Throughput::Bytes(payload.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, p| {
            b.iter(|| black_box(parse_frames(black_box(p)).unwrap()))
        });
    }

    group.finish();
}

/// Benchmark buffer pool acquire/release cycle (typical hot path)
fn bench_buffer_pool_cycle(c: &mut Criterion) {
    let pool = BufferPool::new(1500, 1024);

    c.bench_function("buffer_pool_cycle", |b| {
        b.iter(|| {
            let buf = pool.acquire();
            black_box(&buf);
            pool.release(buf);
        })
    });
}

criterion_group!(
    benches,
    bench_decode_header,
    bench_decode_packet,
    bench_parse_frames,
    bench_buffer_pool_cycle
);
criterion_main!(benches);

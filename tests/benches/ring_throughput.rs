//! Ring buffer throughput
//!
//! Run: cargo bench -p bsp-tests --bench ring_throughput
//!
//!   put_get/<chunk>   producer/consumer round trip with a fixed chunk size
//!   put_force/<chunk> overwrite path on a permanently full buffer
//!   key_scan          one 10-key keypad scan feeding the key FIFO

use std::hint::black_box;

use bsp_core::hal::mock::MockKeys;
use bsp_core::{default_config, KeyId, Keypad, RingBuffer, KEY_FIFO_SIZE, UART_BUF_SIZE};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn bench_put_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("put_get");
    for chunk in [1usize, 16, 64, 512] {
        group.throughput(Throughput::Bytes(chunk as u64));
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &chunk, |b, &chunk| {
            let mut storage = [0u8; UART_BUF_SIZE];
            let mut ring = RingBuffer::new(&mut storage).unwrap();
            let data = vec![0x55u8; chunk];
            let mut out = vec![0u8; chunk];
            b.iter(|| {
                ring.put(black_box(&data));
                black_box(ring.get(&mut out));
            });
        });
    }
    group.finish();
}

fn bench_put_force(c: &mut Criterion) {
    let mut group = c.benchmark_group("put_force");
    for chunk in [1usize, 16, 64] {
        group.throughput(Throughput::Bytes(chunk as u64));
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &chunk, |b, &chunk| {
            let mut storage = [0u8; KEY_FIFO_SIZE * 4];
            let mut ring = RingBuffer::new(&mut storage).unwrap();
            let data = vec![0xAAu8; chunk];
            ring.put_force(&[0; KEY_FIFO_SIZE * 4]);
            b.iter(|| black_box(ring.put_force(black_box(&data))));
        });
    }
    group.finish();
}

fn bench_key_scan(c: &mut Criterion) {
    let mut storage = [0u8; KEY_FIFO_SIZE];
    let mut keypad = Keypad::new(MockKeys::new(), &mut storage, default_config()).unwrap();
    keypad.input_mut().set_pressed(KeyId::JoyOk.id(), true);
    c.bench_function("key_scan", |b| {
        b.iter(|| {
            black_box(keypad.scan());
            keypad.clear();
        })
    });
}

criterion_group!(benches, bench_put_get, bench_put_force, bench_key_scan);
criterion_main!(benches);

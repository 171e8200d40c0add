//! Benchmarks for the CAB hot path.

use criterion::{Criterion, criterion_group, criterion_main};
use ptask_cab::{CabPool, SlotTable};
use ptask_time::MonotonicClock;
use std::hint::black_box;

fn bench_slot_table_cycle(c: &mut Criterion) {
    let Ok(mut table) = SlotTable::new(4) else {
        return;
    };

    c.bench_function("slot_table_reserve_publish_acquire_release", |b| {
        b.iter(|| {
            if let Ok(token) = table.reserve() {
                let _outcome = black_box(table.publish(token));
            }
            if let Ok(token) = table.acquire_latest() {
                let _outcome = black_box(table.release(token));
            }
        });
    });
}

fn bench_cab_write(c: &mut Criterion) {
    let pool = CabPool::with_defaults(MonotonicClock::shared());
    let Ok(cab) = pool.create_zeroed("bench-write", 3, 1024) else {
        return;
    };

    c.bench_function("cab_write_1k", |b| {
        b.iter(|| {
            let _outcome = black_box(cab.write_with(|buf| buf.fill(black_box(0xA5))));
        });
    });
}

fn bench_cab_read(c: &mut Criterion) {
    let pool = CabPool::with_defaults(MonotonicClock::shared());
    let Ok(cab) = pool.create("bench-read", vec![[0.0_f32; 256]; 3]) else {
        return;
    };
    if cab.write_with(|frame| frame.fill(0.5)).is_err() {
        return;
    }

    c.bench_function("cab_read_frame", |b| {
        b.iter(|| {
            let _outcome = black_box(cab.read_with(|frame, _at| frame.iter().sum::<f32>()));
        });
    });
}

criterion_group!(benches, bench_slot_table_cycle, bench_cab_write, bench_cab_read);
criterion_main!(benches);

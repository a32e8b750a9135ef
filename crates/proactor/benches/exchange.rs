//! Exchange-layer hot paths:
//! * one pooled entry through its whole lifecycle
//! * registry register/resolve with 64 tags live
//! * a nop round trip through a real ring (skipped without io_uring)

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use proactor::{
    CompletionRegistry, EntryRef, ExchangeEntryFactory, OpKind, Proactor, ProactorConfig,
};
use proactor::exchange::NopKind;
use proactor_core::Timeout;

fn entry_lifecycle(c: &mut Criterion) {
    let mut factory = ExchangeEntryFactory::default();

    c.bench_function("entry_lifecycle", |b| {
        b.iter(|| {
            let slot = factory.alloc::<NopKind>().unwrap();
            let entry = factory.entry::<NopKind>(slot);
            entry.prepare((), Box::new(|_, _| {})).unwrap();
            entry.assign_tag(black_box(slot));
            entry.mark_submitted();
            let _ = black_box(entry.complete(0, 0));
            factory.release::<NopKind>(slot);
        });
    });
}

fn registry(c: &mut Criterion) {
    let mut registry = CompletionRegistry::with_capacity(128);
    for slot in 0..64 {
        registry.register(EntryRef::new(OpKind::Read, slot));
    }

    c.bench_function("registry_register_resolve", |b| {
        b.iter(|| {
            let tag = registry.register(EntryRef::new(OpKind::Nop, 0));
            black_box(registry.resolve(black_box(tag)));
        });
    });
}

fn nop_round_trip(c: &mut Criterion) {
    let Ok(mut proactor) = Proactor::new(ProactorConfig::default().wake_poll(false)) else {
        eprintln!("io_uring unavailable, skipping nop_round_trip");
        return;
    };

    c.bench_function("nop_round_trip", |b| {
        b.iter(|| {
            proactor.nop(|result, _| {
                black_box(result).ok();
            });
            while proactor.in_flight() > 0 {
                proactor.process_completions(Some(Timeout::from_millis(100))).unwrap();
            }
        });
    });
}

fn criterion_benchmark(c: &mut Criterion) {
    entry_lifecycle(c);
    registry(c);
    nop_round_trip(c);
}

criterion_group! {
    name = benches;
    config = Criterion::default();
    targets = criterion_benchmark
}

criterion_main!(benches);

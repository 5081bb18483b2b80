use criterion::{black_box, criterion_group, criterion_main, Criterion};
use garnet_core::{core_registry, HeapConfig, MemoryManager, SymbolId, Value};
use std::sync::Arc;

fn fresh() -> (MemoryManager, garnet_core::CoreTypes) {
    let (types, core) = core_registry();
    (
        MemoryManager::new(Arc::new(types), HeapConfig::default()),
        core,
    )
}

fn bench_allocation(c: &mut Criterion) {
    c.bench_function("nursery_allocate_4_fields", |b| {
        let (mut mm, core) = fresh();
        b.iter(|| black_box(mm.allocate(core.object, 4).unwrap()));
    });

    c.bench_function("young_cycle_1000_dead", |b| {
        let (mut mm, core) = fresh();
        b.iter(|| {
            for _ in 0..1000 {
                mm.allocate(core.object, 2).unwrap();
            }
            mm.collect_young();
        });
    });

    c.bench_function("young_cycle_100_survivors", |b| {
        let (mut mm, core) = fresh();
        let mut roots = Vec::new();
        for _ in 0..100 {
            let obj = mm.allocate(core.object, 2).unwrap();
            roots.push(mm.add_root(obj));
        }
        b.iter(|| {
            for _ in 0..900 {
                mm.allocate(core.object, 2).unwrap();
            }
            mm.collect_young();
        });
    });

    c.bench_function("field_store_with_barrier", |b| {
        let (mut mm, core) = fresh();
        let holder = mm.allocate_mature(core.object, 1).unwrap();
        let young = mm.allocate(core.object, 0).unwrap();
        mm.add_root(young);
        b.iter(|| mm.set_field(holder, 0, black_box(young)).unwrap());
    });

    c.bench_function("ivar_set_compact_tier", |b| {
        let (mut mm, core) = fresh();
        let obj = mm.allocate(core.object, 0).unwrap();
        mm.add_root(obj);
        b.iter(|| mm.set_ivar(obj, SymbolId(1), black_box(Value::fixnum(7))));
    });
}

criterion_group!(benches, bench_allocation);
criterion_main!(benches);

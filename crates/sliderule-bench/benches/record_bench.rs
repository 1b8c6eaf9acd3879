//! Record construction, field access, and serialize/deserialize throughput
//! (spec §4.2.2–§4.2.4).

use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use sliderule_core::record::{FieldSpec, FieldType, MaxFields, RecordObject, RecordRegistry};

fn registry() -> Arc<RecordRegistry> {
    let registry = Arc::new(RecordRegistry::new());
    let fields = vec![
        FieldSpec::new("seq", FieldType::Uint32, 0, 1),
        FieldSpec::new("delta", FieldType::Int32, 32, 1),
        FieldSpec::new("value", FieldType::Double, 64, 1),
    ];
    registry
        .define_record("counter", None, 16, &fields, MaxFields::Calc)
        .unwrap();
    registry
}

fn bench_construct_and_set(c: &mut Criterion) {
    let registry = registry();
    c.bench_function("record_construct_and_set", |b| {
        b.iter(|| {
            let mut rec = RecordObject::new(&registry, "counter", 0).unwrap();
            let seq = rec.resolve_field("seq").unwrap();
            rec.set_value_integer(&seq, black_box(42), 0).unwrap();
            black_box(rec.serialize_allocate());
        });
    });
}

fn bench_get_value_integer(c: &mut Criterion) {
    let registry = registry();
    let mut rec = RecordObject::new(&registry, "counter", 0).unwrap();
    let seq = rec.resolve_field("seq").unwrap();
    rec.set_value_integer(&seq, 7, 0).unwrap();

    c.bench_function("record_get_value_integer", |b| {
        b.iter(|| {
            black_box(rec.get_value_integer(&seq, 0).unwrap());
        });
    });
}

fn bench_deserialize_roundtrip(c: &mut Criterion) {
    let registry = registry();
    let mut rec = RecordObject::new(&registry, "counter", 0).unwrap();
    let seq = rec.resolve_field("seq").unwrap();
    rec.set_value_integer(&seq, 99, 0).unwrap();
    let bytes = rec.serialize_allocate();

    c.bench_function("record_deserialize", |b| {
        b.iter(|| {
            let mut fresh = RecordObject::new(&registry, "counter", 0).unwrap();
            fresh.deserialize(&bytes).unwrap();
            black_box(fresh.get_value_integer(&seq, 0).unwrap());
        });
    });
}

criterion_group!(benches, bench_construct_and_set, bench_get_value_integer, bench_deserialize_roundtrip);
criterion_main!(benches);

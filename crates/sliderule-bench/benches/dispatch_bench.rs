//! `RecordDispatcher` routing throughput under a single worker (spec §4.4).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use sliderule_core::dispatch::{DispatchHandler, KeyMode, OutgoingRecord, RecordDispatcher};
use sliderule_core::record::{FieldSpec, FieldType, MaxFields, RecordObject, RecordRegistry};
use sliderule_core::{Publisher, QueueSize, SubscriberType, Timeout};

struct NullHandler {
    count: Arc<AtomicU64>,
}

impl DispatchHandler for NullHandler {
    fn process_record(&self, _record: &RecordObject<'_>, _key: u64, _out: &mut Vec<OutgoingRecord>) -> bool {
        self.count.fetch_add(1, Ordering::Relaxed);
        true
    }
}

fn bench_single_worker_routing(c: &mut Criterion) {
    let registry = Arc::new(RecordRegistry::new());
    let fields = vec![FieldSpec::new("seq", FieldType::Uint32, 0, 1)];
    registry.define_record("ping", None, 4, &fields, MaxFields::Calc).unwrap();

    let queue_name = "bench-dispatch-routing";
    let publisher = Publisher::new(queue_name, QueueSize::Depth(256), QueueSize::Depth(64));
    let dispatcher = RecordDispatcher::new(registry.clone(), queue_name, KeyMode::Receipt, 1, SubscriberType::Confidence);
    let count = Arc::new(AtomicU64::new(0));
    dispatcher.attach("ping", Arc::new(NullHandler { count: count.clone() }));

    c.bench_function("dispatch_single_worker_routing", |b| {
        b.iter(|| {
            let rec = RecordObject::new(&registry, "ping", 0).unwrap();
            publisher.post_copy(rec.serialize_reference(), Timeout::Pend).unwrap();
            let before = count.load(Ordering::Relaxed);
            while count.load(Ordering::Relaxed) == before {
                std::thread::sleep(Duration::from_micros(50));
            }
            black_box(count.load(Ordering::Relaxed));
        });
    });
}

criterion_group!(benches, bench_single_worker_routing);
criterion_main!(benches);

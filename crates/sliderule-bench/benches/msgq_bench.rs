//! Post/receive throughput for the named-queue fabric (spec §4.3).

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use sliderule_core::{Publisher, QueueSize, Subscriber, SubscriberType, Timeout};

fn bench_post_receive_copy(c: &mut Criterion) {
    let name = "bench-post-receive-copy";
    let publisher = Publisher::new(name, QueueSize::Depth(64), QueueSize::Depth(64));
    let subscriber = Subscriber::new(name, SubscriberType::Confidence, QueueSize::Depth(64), QueueSize::Depth(64));
    let payload = [0xABu8; 32];

    c.bench_function("msgq_post_receive_copy", |b| {
        b.iter(|| {
            publisher.post_copy(&payload, Timeout::Check).unwrap();
            let mut buf = [0u8; 32];
            black_box(subscriber.receive_copy(&mut buf, Timeout::Check).unwrap());
        });
    });
}

fn bench_fanout_two_subscribers(c: &mut Criterion) {
    let name = "bench-fanout";
    let publisher = Publisher::new(name, QueueSize::Depth(64), QueueSize::Depth(64));
    let s1 = Subscriber::new(name, SubscriberType::Confidence, QueueSize::Depth(64), QueueSize::Depth(64));
    let s2 = Subscriber::new(name, SubscriberType::Confidence, QueueSize::Depth(64), QueueSize::Depth(64));
    let payload = [0xCDu8; 32];

    c.bench_function("msgq_fanout_two_subscribers", |b| {
        b.iter(|| {
            publisher.post_copy(&payload, Timeout::Check).unwrap();
            let mut buf = [0u8; 32];
            s1.receive_copy(&mut buf, Timeout::Check).unwrap();
            s2.receive_copy(&mut buf, Timeout::Check).unwrap();
            black_box(buf);
        });
    });
}

criterion_group!(benches, bench_post_receive_copy, bench_fanout_two_subscribers);
criterion_main!(benches);

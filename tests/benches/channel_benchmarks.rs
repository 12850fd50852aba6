//! # Keycast Bus Benchmarks
//!
//! | Path | Expectation |
//! |------|-------------|
//! | `try_send` + `receive_batch`, single thread | no allocation beyond the event |
//! | `send_batch` all-or-nothing | one lock per batch |
//! | Producer/consumer across threads | batch drain keeps up with producer |
//! | Broadcast delivery to N routes | linear in N |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use keycast_bus::{BoundedChannel, Command, Event, Receiver, Sender, ShutdownSignal};
use keycast_runtime::adapters::{LoggingInjector, StaticResolver};
use keycast_runtime::ports::{KeyBinding, TargetHandle};
use keycast_runtime::{RegistryConfig, RoutingRegistry};
use rand::Rng;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn bench_single_thread(c: &mut Criterion) {
    let mut group = c.benchmark_group("bus-single-thread");
    let shutdown = ShutdownSignal::new();

    for batch in [1usize, 10, 100] {
        let channel = BoundedChannel::with_capacity(1000, &shutdown);
        let sender = Sender::new(Arc::clone(&channel));
        let receiver = Receiver::new(channel);

        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::new("send_then_drain", batch), &batch, |b, &n| {
            b.iter(|| {
                for seq in 0..n as u64 {
                    sender
                        .send_message(Event::new(Command::Ping, seq, "p"))
                        .expect("capacity");
                }
                black_box(receiver.receive_batch(n))
            })
        });
    }

    let channel = BoundedChannel::with_capacity(1000, &shutdown);
    let sender = Sender::new(Arc::clone(&channel));
    let receiver = Receiver::new(channel);
    group.throughput(Throughput::Elements(10));
    group.bench_function("send_batch_10", |b| {
        b.iter(|| {
            let events = (0..10).map(|seq| Event::key_press(seq, "X", "P", 0)).collect();
            sender.send_batch(events).expect("capacity");
            black_box(receiver.receive_batch(10))
        })
    });

    group.finish();
}

fn bench_cross_thread(c: &mut Criterion) {
    let mut group = c.benchmark_group("bus-cross-thread");
    group.measurement_time(Duration::from_secs(5));
    const EVENTS: u64 = 10_000;
    group.throughput(Throughput::Elements(EVENTS));

    for capacity in [16usize, 1000] {
        group.bench_with_input(BenchmarkId::new("spsc", capacity), &capacity, |b, &cap| {
            b.iter(|| {
                let shutdown = ShutdownSignal::new();
                let channel = BoundedChannel::with_capacity(cap, &shutdown);
                let sender = Sender::new(Arc::clone(&channel));
                let receiver = Receiver::new(Arc::clone(&channel));

                let consumer = thread::spawn(move || {
                    let mut seen = 0u64;
                    while seen < EVENTS {
                        seen += receiver.receive_batch(10).len() as u64;
                    }
                    seen
                });
                for seq in 0..EVENTS {
                    sender
                        .send_blocking(Event::new(Command::Ping, seq, ""))
                        .expect("open channel");
                }
                black_box(consumer.join().expect("consumer"))
            })
        });
    }

    group.finish();
}

fn bench_broadcast(c: &mut Criterion) {
    let mut group = c.benchmark_group("routing-broadcast");
    let mut rng = rand::thread_rng();

    for instances in [1u32, 4, 16] {
        let resolver = StaticResolver::new();
        for i in 0..instances {
            resolver.register("P", i, TargetHandle::from_raw(rng.gen()));
        }
        let registry = RoutingRegistry::new(
            RegistryConfig::default(),
            Arc::new(resolver),
            Arc::new(LoggingInjector),
            Arc::new(Vec::<KeyBinding>::new()),
        )
        .expect("registry");
        for i in 0..instances {
            registry.attach("P", i).expect("attach");
        }

        group.throughput(Throughput::Elements(u64::from(instances)));
        group.bench_with_input(BenchmarkId::new("deliver", instances), &instances, |b, _| {
            let mut seq = 0u64;
            b.iter(|| {
                seq += 1;
                black_box(registry.deliver(Event::key_press(seq, "X", "P", -1)))
            })
        });
        registry.shutdown();
    }

    group.finish();
}

criterion_group!(benches, bench_single_thread, bench_cross_thread, bench_broadcast);
criterion_main!(benches);

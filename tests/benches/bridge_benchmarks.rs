//! # MQ Bridge Benchmarks
//!
//! | Path | Expectation |
//! |------|-------------|
//! | Cache hit for a known credential | no broker call, sub-microsecond |
//! | Basic credential decoding | per request, negligible next to I/O |
//! | Body line joining | linear in body size |
//! | Echo round trip (in-memory) | dominated by task wakeups |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mq_broker::{echo, InMemoryBroker, Responder};
use mq_bridge::front::{decode_basic, join_lines};
use mq_bridge::{
    BridgeGateway, BridgeMetrics, BridgeRequest, BridgeService, Credential, InMemoryBrokerAdapter,
    ReplyMatching, ResourceCache, StaticDirectory,
};
use std::sync::Arc;
use std::time::Duration;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

fn broker() -> InMemoryBroker {
    let broker = InMemoryBroker::new();
    broker.add_user("alice", "secret");
    broker.add_user("svc", "pw");
    broker
}

fn cache(broker: &InMemoryBroker) -> Arc<ResourceCache> {
    Arc::new(ResourceCache::new(
        Arc::new(StaticDirectory::new("jms/ConnectionFactory")),
        Arc::new(InMemoryBrokerAdapter::new(broker.clone())),
    ))
}

fn bench_cache_hit(c: &mut Criterion) {
    let rt = runtime();
    let broker = broker();
    let cache = cache(&broker);
    let alice = Credential::new("alice", "secret");
    rt.block_on(cache.acquire(&alice)).unwrap();

    c.bench_function("cache_acquire_hit", |b| {
        b.iter(|| rt.block_on(cache.acquire(black_box(&alice))).unwrap())
    });
}

fn bench_decode_basic(c: &mut Criterion) {
    let header = "Basic YWxpY2U6c2VjcmV0";
    c.bench_function("decode_basic", |b| {
        b.iter(|| decode_basic(black_box(header)).unwrap())
    });
}

fn bench_join_lines(c: &mut Criterion) {
    let mut group = c.benchmark_group("join_lines");
    for lines in [10usize, 100, 1000] {
        let body: String = (0..lines).map(|i| format!("line number {}\n", i)).collect();
        group.throughput(Throughput::Bytes(body.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lines), &body, |b, body| {
            b.iter(|| join_lines(black_box(body)))
        });
    }
    group.finish();
}

fn bench_echo_round_trip(c: &mut Criterion) {
    let rt = runtime();
    let broker = broker();
    let _responder = rt.block_on(async {
        Responder::spawn(Arc::new(broker.connect("svc", "pw").unwrap()), "echo", echo)
    });

    let mut group = c.benchmark_group("echo_round_trip");
    group.measurement_time(Duration::from_secs(10));
    for matching in [ReplyMatching::CorrelationId, ReplyMatching::SharedChannel] {
        let service = BridgeService::new(
            cache(&broker),
            Arc::new(BridgeGateway::new(matching)),
            Arc::new(BridgeMetrics::new()),
        );
        group.bench_function(format!("{:?}", matching), |b| {
            b.iter(|| {
                let request = BridgeRequest {
                    destination: "echo".into(),
                    payload: "ping".into(),
                    credential: Credential::new("alice", "secret"),
                    timeout: Duration::from_secs(5),
                };
                rt.block_on(service.forward(request)).unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_cache_hit,
    bench_decode_basic,
    bench_join_lines,
    bench_echo_round_trip
);
criterion_main!(benches);

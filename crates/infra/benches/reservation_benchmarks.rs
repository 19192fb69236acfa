use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use std::sync::Arc;
use std::time::Duration;

use stockledger_core::{ProductId, StoreId};
use stockledger_infra::{
    ConcurrencyStrategy, EngineConfig, InMemoryInventoryStore, InMemoryReorderSink, ReservationEngine,
};

type Engine = ReservationEngine<Arc<InMemoryInventoryStore>, InMemoryReorderSink>;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap()
}

fn engine(strategy: ConcurrencyStrategy) -> Engine {
    let config = EngineConfig::default()
        .with_strategy(strategy)
        .with_max_conflict_retries(10_000)
        .with_retry_backoff(Duration::ZERO);
    ReservationEngine::new(
        Arc::new(InMemoryInventoryStore::new()),
        InMemoryReorderSink::new(),
        config,
    )
}

const STRATEGIES: [(&str, ConcurrencyStrategy); 2] = [
    ("keyed_lock", ConcurrencyStrategy::KeyedLock),
    ("optimistic", ConcurrencyStrategy::Optimistic),
];

/// Uncontended reserve + release round on one key.
fn bench_reserve_release_latency(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("reserve_release_latency");
    group.sample_size(1000);

    for (name, strategy) in STRATEGIES {
        let engine = engine(strategy);
        let (store_id, product_id) = (StoreId::new(), ProductId::new());
        rt.block_on(engine.adjust_on_hand(store_id, product_id, 1_000_000))
            .unwrap();

        group.bench_function(name, |b| {
            b.iter(|| {
                rt.block_on(async {
                    let (record, token) = engine.reserve(store_id, product_id, 1).await.unwrap();
                    black_box(record);
                    black_box(engine.release_reservation(&token).await.unwrap());
                })
            })
        });
    }

    group.finish();
}

/// Many tasks reserving against one hot key.
fn bench_contended_reservations(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("contended_reservations");
    group.sample_size(20);

    for tasks in [8usize, 64, 256] {
        group.throughput(Throughput::Elements(tasks as u64));
        for (name, strategy) in STRATEGIES {
            group.bench_with_input(BenchmarkId::new(name, tasks), &tasks, |b, &tasks| {
                b.iter(|| {
                    rt.block_on(async {
                        let engine = Arc::new(engine(strategy));
                        let (store_id, product_id) = (StoreId::new(), ProductId::new());
                        engine
                            .adjust_on_hand(store_id, product_id, tasks as i64)
                            .await
                            .unwrap();

                        let handles: Vec<_> = (0..tasks)
                            .map(|_| {
                                let engine = engine.clone();
                                tokio::spawn(async move { engine.reserve(store_id, product_id, 1).await })
                            })
                            .collect();
                        for handle in handles {
                            black_box(handle.await.unwrap().unwrap());
                        }
                    })
                })
            });
        }
    }

    group.finish();
}

/// Reads while the same keys are being written.
fn bench_availability_reads(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("availability_reads");

    let engine = engine(ConcurrencyStrategy::KeyedLock);
    let store_id = StoreId::new();
    let products: Vec<ProductId> = (0..1_000).map(|_| ProductId::new()).collect();
    rt.block_on(async {
        for product_id in &products {
            engine.adjust_on_hand(store_id, *product_id, 50).await.unwrap();
        }
    });

    group.throughput(Throughput::Elements(products.len() as u64));
    group.bench_function("get_availability_1000_keys", |b| {
        b.iter(|| {
            rt.block_on(async {
                for product_id in &products {
                    black_box(engine.get_availability(store_id, *product_id).await.unwrap());
                }
            })
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_reserve_release_latency,
    bench_contended_reservations,
    bench_availability_reads
);
criterion_main!(benches);

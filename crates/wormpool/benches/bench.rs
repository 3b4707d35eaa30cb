use core::{hint::black_box, time::Duration};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::sync::Arc;
use tokio::{runtime::Builder, sync::mpsc};
use wormpool::{PoolConfig, RequestPool, WorkPool};

const BATCH: usize = 1024;

#[derive(Clone, Copy, Debug)]
struct PoolBenchParams {
    min_workers: usize,
    max_temp_workers: Option<usize>,
    queue_capacity: usize,
}

impl PoolBenchParams {
    fn config(self) -> PoolConfig {
        PoolConfig {
            min_workers: self.min_workers,
            max_temp_workers: self.max_temp_workers,
            primary_queue_capacity: self.queue_capacity,
            temp_queue_capacity: self.queue_capacity,
            idle_timeout: Duration::from_millis(100),
            hook: None,
        }
    }

    fn label(self) -> String {
        let temp = self
            .max_temp_workers
            .map_or_else(|| "unlimited".to_string(), |n| n.to_string());
        format!(
            "min{}/temp{}/cap{}",
            self.min_workers, temp, self.queue_capacity
        )
    }
}

const PARAMS: [PoolBenchParams; 3] = [
    PoolBenchParams {
        min_workers: 8,
        max_temp_workers: None,
        queue_capacity: 128,
    },
    PoolBenchParams {
        min_workers: 8,
        max_temp_workers: Some(8),
        queue_capacity: 16,
    },
    PoolBenchParams {
        min_workers: 2,
        max_temp_workers: Some(0),
        queue_capacity: 1,
    },
];

fn bench_request_pool(c: &mut Criterion) {
    let rt = Builder::new_multi_thread()
        .worker_threads(num_threads())
        .enable_all()
        .build()
        .expect("failed to build runtime");

    let mut group = c.benchmark_group("request_pool");
    group.throughput(Throughput::Elements(BATCH as u64));

    for params in PARAMS {
        let pool: Arc<RequestPool<u64, u64, ()>> = rt.block_on(async {
            Arc::new(
                RequestPool::new(|n: u64| async move { Ok(black_box(n) + 1) }, params.config())
                    .expect("valid config"),
            )
        });

        group.bench_function(params.label(), |b| {
            b.to_async(&rt).iter(|| {
                let pool = Arc::clone(&pool);
                async move {
                    let (tx, mut rx) = mpsc::unbounded_channel();
                    for n in 0..BATCH as u64 {
                        let tx = tx.clone();
                        pool.submit(n, move |_, resp| {
                            let _ = tx.send(resp);
                        })
                        .await
                        .expect("pool running");
                    }
                    drop(tx);
                    while let Some(resp) = rx.recv().await {
                        black_box(resp.ok());
                    }
                }
            });
        });

        rt.block_on(pool.shutdown(Duration::from_secs(5)))
            .expect("shutdown");
    }

    group.finish();
}

fn bench_work_pool(c: &mut Criterion) {
    let rt = Builder::new_multi_thread()
        .worker_threads(num_threads())
        .enable_all()
        .build()
        .expect("failed to build runtime");

    let mut group = c.benchmark_group("work_pool");
    group.throughput(Throughput::Elements(BATCH as u64));

    for params in PARAMS {
        let pool = Arc::new(
            rt.block_on(async { WorkPool::new(params.config()).expect("valid config") }),
        );

        group.bench_function(params.label(), |b| {
            b.to_async(&rt).iter(|| {
                let pool = Arc::clone(&pool);
                async move {
                    let (tx, mut rx) = mpsc::unbounded_channel();
                    for n in 0..BATCH {
                        let tx = tx.clone();
                        pool.spawn(async move {
                            let _ = tx.send(black_box(n));
                        })
                        .await
                        .expect("pool running");
                    }
                    drop(tx);
                    while rx.recv().await.is_some() {}
                }
            });
        });

        rt.block_on(pool.shutdown(Duration::from_secs(5)))
            .expect("shutdown");
    }

    group.finish();
}

fn num_threads() -> usize {
    num_cpus::get()
}

criterion_group!(benches, bench_request_pool, bench_work_pool);
criterion_main!(benches);

//! Optimizer benchmarks
//!
//! Plans over synthetic ledgers of increasing size, once per strategy.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;
use worldgame_allocator::{AllocationOptimizer, CompatibilityModel, OptimizerConfig};
use worldgame_common::{Location, Need, PlanKind, Resource, ResourceCategory, StrategyKind, Urgency};
use worldgame_ledger::{Ledger, LedgerConfig};

fn synthetic_ledger(needs: usize) -> Ledger {
    let ledger = Ledger::new(LedgerConfig::default());
    for (i, category) in ResourceCategory::ALL.iter().enumerate() {
        for j in 0..3 {
            let resource = Resource::new(format!("{}-{}", category, j), *category, 1_000.0 + 250.0 * j as f64)
                .with_location(Location::new(10.0 * i as f64, 15.0 * j as f64));
            ledger.register_resource(resource).expect("resource");
        }
    }
    for n in 0..needs {
        let category = ResourceCategory::ALL[n % ResourceCategory::ALL.len()];
        let need = Need::new(format!("need-{}", n), Urgency::new((n % 10) as u8 + 1))
            .with_requirement(category, 50.0 + (n % 7) as f64 * 20.0)
            .with_location(Location::new((n % 90) as f64, (n % 180) as f64));
        ledger.register_need(need).expect("need");
    }
    ledger
}

fn bench_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimizer");
    group.measurement_time(Duration::from_secs(10));

    for needs in [16usize, 64, 256].iter() {
        let ledger = synthetic_ledger(*needs);
        group.throughput(Throughput::Elements(*needs as u64));

        for strategy in [StrategyKind::PriorityGreedy, StrategyKind::Relaxation] {
            let optimizer = AllocationOptimizer::new(
                OptimizerConfig {
                    strategy,
                    parallel: false,
                    ..OptimizerConfig::default()
                },
                CompatibilityModel::default(),
            );
            group.bench_with_input(BenchmarkId::new(strategy.to_string(), needs), needs, |b, _| {
                b.iter(|| ledger.read(|state| black_box(optimizer.plan(state, PlanKind::Routine))));
            });
        }
    }

    group.finish();
}

fn bench_parallel_optimize(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let ledger = synthetic_ledger(128);
    let optimizer = AllocationOptimizer::new(OptimizerConfig::default(), CompatibilityModel::default());

    c.bench_function("optimize_parallel_128", |b| {
        b.iter(|| runtime.block_on(optimizer.optimize(&ledger, PlanKind::Routine)));
    });
}

criterion_group!(benches, bench_strategies, bench_parallel_optimize);
criterion_main!(benches);

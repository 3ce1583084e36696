use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use kilnwatch_logistics::{TruckScheduler, peak_hours};

fn demand(hours: usize) -> Vec<f64> {
    (0..hours)
        .map(|h| 100.0 + 40.0 * ((h as f64) * std::f64::consts::TAU / 24.0).sin())
        .collect()
}

fn bench_schedule(c: &mut Criterion) {
    let scheduler = TruckScheduler::default();
    let mut group = c.benchmark_group("truck_schedule");
    for &hours in &[48usize, 168, 8_760] {
        let d = demand(hours);
        group.throughput(Throughput::Elements(hours as u64));
        group.bench_with_input(BenchmarkId::new("greedy", hours), &d, |b, d| {
            b.iter(|| scheduler.schedule(black_box(d), 500.0))
        });
        group.bench_with_input(BenchmarkId::new("peak_hours", hours), &d, |b, d| {
            b.iter(|| peak_hours(black_box(d), 5))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_schedule);
criterion_main!(benches);

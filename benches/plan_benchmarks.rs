use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use facerebuild_cli::domain::model::{FramePlan, SeekMode};
use facerebuild_cli::domain::rules::EmissionPlanner;
use facerebuild_cli::resolver::sidecar::parse_frame_list;

/// Declared values with a gap of `stride - 1` frames every tenth entry
fn values(len: usize, stride: i64) -> Vec<i64> {
    let mut next = 0;
    (0..len)
        .map(|i| {
            let v = next;
            next += if i % 10 == 9 { stride } else { 1 };
            v
        })
        .collect()
}

fn bench_emission_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("emission_plan");
    for len in [1_000usize, 10_000, 100_000] {
        let plan = FramePlan::from_sidecar("bench", 500, &values(len, 7), SeekMode::Declared)
            .expect("non-negative plan");
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &plan, |b, plan| {
            b.iter(|| EmissionPlanner::plan(black_box(plan)))
        });
    }
    group.finish();
}

fn bench_sidecar_parse(c: &mut Criterion) {
    let text = values(50_000, 3)
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",");
    c.bench_function("sidecar_parse_50k", |b| {
        b.iter(|| parse_frame_list(black_box(&text)))
    });
}

criterion_group!(benches, bench_emission_plan, bench_sidecar_parse);
criterion_main!(benches);

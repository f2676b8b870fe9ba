use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lyricat_engine::{
    core::{Candidate, ChartKind, SessionToken},
    providers::MockScoreSource,
    BestScheduler,
};
use std::sync::Arc;

/// `songs` songs with four charts each, hardest first
fn setup(songs: u32) -> (Vec<Candidate>, Arc<MockScoreSource>) {
    let mut charts = Vec::new();
    let mut mock = MockScoreSource::new();
    for song in 0..songs {
        let base = 2.0 + (song % 11) as f64;
        for (k, chart) in [ChartKind::Easy, ChartKind::Normal, ChartKind::Hard, ChartKind::Master]
            .into_iter()
            .enumerate()
        {
            charts.push((song, chart, base + k as f64));
            mock = mock.with_score(song, chart, 950_000 + (song * 37 + k as u32 * 101) % 50_000);
        }
    }
    charts.sort_by(|a, b| b.2.total_cmp(&a.2));
    let candidates = charts
        .into_iter()
        .enumerate()
        .map(|(i, (song, chart, d))| Candidate::new(i, song, chart, d))
        .collect();
    (candidates, Arc::new(mock))
}

fn bench_best(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let token = SessionToken::new("r:bench");
    let (candidates, mock) = setup(300);

    let mut group = c.benchmark_group("best_35");
    for workers in [1, 8, 32] {
        let scheduler = BestScheduler::new(mock.clone(), workers);
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, _| {
            b.to_async(&runtime).iter(|| async {
                // keep the call log from growing across iterations
                mock.reset();
                black_box(scheduler.best(35, &candidates, &token).await.unwrap())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_best);
criterion_main!(benches);

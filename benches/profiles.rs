use ceteris::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array1;
use rand::prelude::*;

fn create_regression_data(n_rows: usize, n_features: usize) -> (Dataset, Array1<f64>) {
    let mut rng = StdRng::seed_from_u64(42);

    let columns: Vec<Column> = (0..n_features)
        .map(|i| {
            let values: Vec<f64> = (0..n_rows).map(|_| rng.gen::<f64>() * 10.0).collect();
            Column::numeric(format!("feature_{}", i), values)
        })
        .collect();
    let data = Dataset::new(columns).unwrap();

    // Target as sum of features + noise
    let target: Array1<f64> = (0..n_rows)
        .map(|i| {
            let sum: f64 = data.columns().iter().map(|c| c.encoded(i)).sum();
            sum + rng.gen::<f64>() * 0.1
        })
        .collect();

    (data, target)
}

fn additive(rows: &Dataset) -> Result<Array1<f64>> {
    Ok(rows.to_array2().sum_axis(ndarray::Axis(1)))
}

fn bench_profiles(c: &mut Criterion) {
    let mut group = c.benchmark_group("profiles");

    let (data, _) = create_regression_data(2000, 10);
    let explainer = CeterisParibus::new(additive, data.clone());

    for n_obs in [1, 10, 50].iter() {
        let indices: Vec<usize> = (0..*n_obs).collect();
        let observations = data.take(&indices);

        group.bench_with_input(
            BenchmarkId::new("explain", n_obs),
            &observations,
            |b, obs| {
                b.iter(|| explainer.explain::<&str>(black_box(obs), None).unwrap())
            },
        );
    }

    let table = explainer.explain::<&str>(&data.take(&(0..100).collect::<Vec<_>>()), None).unwrap();
    for aggregator in [
        ProfileAggregator::partial(),
        ProfileAggregator::conditional(),
        ProfileAggregator::accumulated(),
    ] {
        let name = aggregator.config().aggregation_type.to_string();
        group.bench_function(BenchmarkId::new("aggregate", name), |b| {
            b.iter(|| aggregator.aggregate::<&str>(black_box(&table), None).unwrap())
        });
    }

    group.finish();
}

fn bench_importance(c: &mut Criterion) {
    let mut group = c.benchmark_group("importance");
    group.sample_size(10); // Each run rescoring every column

    for n_rows in [500, 2000].iter() {
        let (data, y) = create_regression_data(*n_rows, 10);
        let explainer = PermutationImportance::new(additive).with_seed(7);

        group.bench_with_input(
            BenchmarkId::new("permutation", n_rows),
            &(data, y),
            |b, (data, y)| {
                b.iter(|| explainer.compute::<&str>(black_box(data), y, None).unwrap())
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_profiles, bench_importance);
criterion_main!(benches);

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use dynprice::ml::gbdt::{GbdtRegressor, HyperParams};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng, rngs::StdRng};

const ROWS: usize = 10_000;

fn synthetic(rows: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = StdRng::seed_from_u64(42);
    let mut x = Array2::zeros((rows, 4));
    let mut y = Array1::zeros(rows);
    for i in 0..rows {
        let price = rng.random_range(5.0..500.0);
        let freight = rng.random_range(2.0..60.0);
        let high = f64::from(u8::from(freight > 20.0));
        x[[i, 0]] = price;
        x[[i, 1]] = freight;
        x[[i, 2]] = price + freight;
        x[[i, 3]] = high;
        y[i] = if high > 0.0 { price * 1.05 } else { price };
    }
    (x, y)
}

fn bench_fit(c: &mut Criterion) {
    let (x, y) = synthetic(ROWS);
    let mut group = c.benchmark_group("gbdt_fit");
    group.sample_size(10);
    for n_jobs in [1, -1] {
        let params = HyperParams {
            n_estimators: 50,
            n_jobs,
            ..HyperParams::default()
        };
        group.bench_with_input(BenchmarkId::new("n_jobs", n_jobs), &params, |b, params| {
            b.iter(|| {
                GbdtRegressor::new(params.clone())
                    .fit(black_box(x.view()), black_box(y.view()))
                    .expect("fit")
            });
        });
    }
    group.finish();
}

fn bench_predict(c: &mut Criterion) {
    let (x, y) = synthetic(ROWS);
    let model = GbdtRegressor::new(HyperParams::default())
        .fit(x.view(), y.view())
        .expect("fit");
    c.bench_with_input(BenchmarkId::new("gbdt_predict", ROWS), &x, |b, x| {
        b.iter(|| model.predict(black_box(x.view())).expect("predict"));
    });
}

criterion_group!(benches, bench_fit, bench_predict);
criterion_main!(benches);

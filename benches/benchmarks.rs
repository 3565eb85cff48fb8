use criterion::{black_box, criterion_group, criterion_main, Criterion};
use detrital::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn parents(rng: &mut StdRng, config: &DistributionConfig) -> Vec<Population> {
    [(300.0, 50.0), (1100.0, 90.0), (2400.0, 150.0)]
        .iter()
        .map(|&(mean, sd)| {
            Population::from_sample(Sample::from_normal(mean, sd, 20.0, 150, rng).unwrap(), config)
                .unwrap()
        })
        .collect()
}

pub fn enumeration_benchmark(c: &mut Criterion) {
    c.bench_function("enumerate_4_parents_0.02", |b| {
        b.iter(|| MixingCoefficients::new(4, black_box(0.02)).unwrap().count())
    });
}

pub fn density_benchmark(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(1);
    let sample = Sample::from_normal(1000.0, 300.0, 20.0, 500, &mut rng).unwrap();
    let config = DistributionConfig::new().axis(AxisSpec::fixed(0.0, 3000.0, 1.0));
    c.bench_function("pdp_500_grains", |b| {
        b.iter(|| Population::from_sample(black_box(sample.clone()), &config))
    });
}

pub fn mixture_benchmark(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(2);
    let config = DistributionConfig::new().axis(AxisSpec::fixed(0.0, 3000.0, 1.0));
    let parents = parents(&mut rng, &config);
    let daughter = Population::from_mixture(&parents, &[0.2, 0.3, 0.5]).unwrap();
    c.bench_function("mixture_dmax_3_parents_0.05", |b| {
        b.iter(|| {
            let mut model = MixtureModel::new(&daughter, &parents, &Metric::Dmax)
                .unwrap()
                .step(0.05);
            model.simulate().map(|fits| fits.len())
        })
    });
}

pub fn permutation_benchmark(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(3);
    let a = Sample::from_normal(600.0, 150.0, 15.0, 100, &mut rng).unwrap();
    let b = Sample::from_normal(700.0, 150.0, 15.0, 100, &mut rng).unwrap();
    let test = PermutationTest::new(true).iterations(100).seed(5);
    c.bench_function("permutation_dmax_100", |bench| {
        bench.iter(|| test.evaluate(black_box(&a), black_box(&b), &Metric::Dmax))
    });
}

criterion_group!(
    benches,
    enumeration_benchmark,
    density_benchmark,
    mixture_benchmark,
    permutation_benchmark
);
criterion_main!(benches);

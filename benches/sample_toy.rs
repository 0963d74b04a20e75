use criterion::{criterion_group, criterion_main, Criterion};

extern crate fluxrates;

use fluxrates::{pfba, BoundMode, ConditionRates, ModelLp, RateMap, RateModel};
use good_lp::default_solver;
use rand::{rngs::StdRng, SeedableRng};

use std::str::FromStr;

const EXAMPLE: &str = include_str!("../tests/data/toy.xml");

fn read_toy() {
    ModelLp::from_str(EXAMPLE).unwrap();
}

fn pfba_toy() {
    let model = ModelLp::from_str(EXAMPLE).unwrap();
    pfba(&model, default_solver, 1.).unwrap();
}

fn sample_toy() {
    let mut map = RateMap::empty();
    map.insert("EX_a_e", "q_A");
    let mut model = RateModel::new(ModelLp::from_str(EXAMPLE).unwrap()).with_rate_map(map);
    let mut rates = ConditionRates::default();
    rates.mean.insert(String::from("q_A"), -4.);
    rates.sd.insert(String::from("q_A"), 0.5);
    let mut rng = StdRng::seed_from_u64(42);
    model.set_rates(&rates, BoundMode::Mean, &mut rng).unwrap();
    model
        .sample_condition(&rates, 50, &mut rng, default_solver)
        .unwrap();
}

fn read_benchmark(c: &mut Criterion) {
    c.bench_function("Read toy SBML", |b| b.iter(read_toy));
}

fn optimize_benchmark(c: &mut Criterion) {
    c.bench_function("pFBA toy", |b| b.iter(pfba_toy));
}

fn sampling_benchmark(c: &mut Criterion) {
    c.bench_function("Sample 50 bound sets", |b| b.iter(sample_toy));
}

criterion_group!(benches, optimize_benchmark, read_benchmark, sampling_benchmark);
criterion_main!(benches);

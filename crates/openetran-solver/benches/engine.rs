//! Benchmark of a short single-pole transient with an arrester clamp.

use criterion::{criterion_group, criterion_main, Criterion};
use openetran_parser::parse_deck;
use openetran_solver::Simulation;

const DECK: &str = "\
1 1 300.0 1 1 1.0e-9 5.0e-6
cable 1 300.0 3.0e8 0.0
end
surge 10.0e3 1.2e-6 50.0e-6 0.0
pairs 1 0
poles 1
arrester 40.0e3 30.0e3 1.0 0.0 0.0
pairs 1 0
poles 1
meter 0
pairs 1 0
poles 1
";

fn bench_transient(c: &mut Criterion) {
    let deck = parse_deck(DECK).unwrap();
    let mut sim = Simulation::build(&deck).unwrap();
    c.bench_function("single_pole_arrester_5us", |b| {
        b.iter(|| {
            sim.reset().unwrap();
            sim.run(None).unwrap()
        })
    });
}

criterion_group!(benches, bench_transient);
criterion_main!(benches);

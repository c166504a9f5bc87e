//! Benchmarks for deduplication and a full generation step.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use chem_evolve::{
    LabeledGraph, RunConfig,
    compute::evolution::{AcceptAll, EvolutionEngine, NoObjective, remove_duplicates},
    schema::Molecule,
};

fn molecules(n: usize) -> Vec<Molecule<usize>> {
    (0..n)
        .map(|i| {
            let mut m = Molecule::new(i);
            // Roughly one duplicate in four.
            m.props.canonical_id = Some(format!("M{:08}", (i * 7919) % (3 * n / 4).max(1)));
            m.props.filtered = i % 2 == 0;
            m.props.selected_count = 1;
            m
        })
        .collect()
}

fn bench_remove_duplicates(c: &mut Criterion) {
    let mut group = c.benchmark_group("remove_duplicates");

    for size in [100, 1_000, 10_000, 100_000] {
        let input = molecules(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            b.iter(|| remove_duplicates(black_box(input.clone())))
        });
    }

    group.finish();
}

fn bench_generation_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("generation_step");
    group.sample_size(20);

    for subset_size in [10, 50] {
        let mut config = RunConfig::default();
        config.random_seed = Some(42);
        config.population.subset_size = subset_size;
        config.population.max_generations = usize::MAX;

        group.bench_with_input(
            BenchmarkId::from_parameter(subset_size),
            &config,
            |b, config| {
                let mut engine = EvolutionEngine::<LabeledGraph, _, _>::new(
                    config.clone(),
                    AcceptAll,
                    NoObjective,
                )
                .unwrap();
                b.iter(|| engine.step().unwrap())
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_remove_duplicates, bench_generation_step);
criterion_main!(benches);

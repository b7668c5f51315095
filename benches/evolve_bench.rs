//! Benchmarks for symbios-neuroevo.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use symbios_neuroevo::{codec, Activation, Genome, Simulation, SimulationConfig};

fn grown_genome(rng: &mut ChaCha8Rng) -> Genome {
    let mut genome = Genome::new(4, 2, Activation::Tanh, rng).expect("valid dimensions");
    genome.mutate(60, rng);
    genome
}

fn bench_genome_creation(c: &mut Criterion) {
    c.bench_function("genome_fully_connected", |b| {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        b.iter(|| {
            black_box(Genome::new(4, 2, Activation::Tanh, &mut rng).ok());
        });
    });
}

fn bench_mutation(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let genome = grown_genome(&mut rng);

    c.bench_function("genome_mutation", |b| {
        b.iter(|| {
            let mut g = genome.clone();
            g.mutate(2, &mut rng);
            black_box(g);
        });
    });
}

fn bench_forward(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let genome = grown_genome(&mut rng);
    let input = [0.5, -0.5, 0.25, 1.0];

    c.bench_function("forward_cached", |b| {
        b.iter(|| {
            black_box(genome.forward(black_box(&input)).ok());
        });
    });

    c.bench_function("forward_after_clone", |b| {
        b.iter(|| {
            let fresh = genome.clone();
            black_box(fresh.forward(black_box(&input)).ok());
        });
    });
}

fn bench_codec(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let genome = grown_genome(&mut rng);
    let text = codec::to_text(&genome).expect("finite payloads");

    c.bench_function("codec_text_roundtrip", |b| {
        b.iter(|| {
            let text = codec::to_text(black_box(&genome)).expect("finite payloads");
            black_box(codec::from_text(&text).ok());
        });
    });

    c.bench_function("codec_text_parse", |b| {
        b.iter(|| {
            black_box(codec::from_text(black_box(&text)).ok());
        });
    });
}

fn bench_generation(c: &mut Criterion) {
    let config = SimulationConfig {
        population_size: 200,
        max_iterations: 1,
        seed: Some(42),
        ..SimulationConfig::default()
    };
    let mut sim = Simulation::new(config, 4, 2, Activation::Tanh, ())
        .expect("valid dimensions");
    let fitness = |genome: &Genome, _: &()| {
        genome
            .forward(&[0.1, 0.2, 0.3, 0.4])
            .map_or(f64::NAN, |out| out.iter().sum())
    };

    c.bench_function("simulation_step_200", |b| {
        b.iter(|| {
            black_box(sim.step(&fitness, None));
        });
    });
}

criterion_group!(
    benches,
    bench_genome_creation,
    bench_mutation,
    bench_forward,
    bench_codec,
    bench_generation,
);
criterion_main!(benches);

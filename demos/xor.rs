//! XOR example using the elitist simulation.
//!
//! Evolves a network for the XOR problem, the classic neuroevolution
//! benchmark. Fitness is the squared error over the truth table, so lower
//! is better. The success callback stops training once the error is below
//! the target and writes the champion to `xor_champion.txt`.
//!
//! Run with: `RUST_LOG=debug cargo run --example xor`

use symbios_neuroevo::{
    codec, Activation, Genome, RankingMode, Simulation, SimulationConfig, Termination,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const TRUTH_TABLE: [([f64; 2], f64); 4] = [
    ([0.0, 0.0], 0.0),
    ([0.0, 1.0], 1.0),
    ([1.0, 0.0], 1.0),
    ([1.0, 1.0], 0.0),
];

/// Shared state: how many times the target has been reached.
#[derive(Debug, Clone, Copy, Default)]
struct Progress {
    hits: usize,
}

fn squared_error(genome: &Genome, _: &Progress) -> f64 {
    TRUTH_TABLE
        .iter()
        .map(|(input, expected)| {
            genome
                .forward(input)
                .map_or(f64::NAN, |out| (out[0] - expected).powi(2))
        })
        .sum()
}

fn main() -> symbios_neuroevo::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = SimulationConfig {
        population_size: 150,
        mutation_intensity: 2,
        max_iterations: 500,
        seed: Some(42),
        ..SimulationConfig::with_target(RankingMode::Lowest, 0.01)
    };
    info!(?config, "XOR example");

    let sim = Simulation::new(config, 2, 1, Activation::Sigmoid, Progress::default())?;
    let outcome = sim.train_with_callback(squared_error, |error: f64, progress: &Progress| {
        info!(error, "target reached");
        (Progress { hits: progress.hits + 1 }, true)
    })?;

    let champion = &outcome.best.genome;
    match outcome.termination {
        Termination::SuccessStop => println!("Solved after {} generations", outcome.generations),
        Termination::BudgetExhausted => {
            println!("Budget of {} generations exhausted", outcome.generations);
        }
        Termination::StopCondition => println!("Stopped after {} generations", outcome.generations),
    }
    println!("Best error: {:.6}", outcome.best.fitness);
    println!("Hidden neurons: {}", champion.hidden());
    println!("Synapses: {}", champion.synapse_count());
    println!("Target hits: {}", outcome.state.hits);

    println!("\nChampion XOR outputs:");
    for (input, expected) in TRUTH_TABLE {
        let output = champion.forward(&input)?[0];
        let status = if (output.round() - expected).abs() < 0.1 {
            "ok"
        } else {
            "miss"
        };
        println!(
            "  {} XOR {} = {:.4} (expected {}) {}",
            input[0], input[1], output, expected, status
        );
    }

    println!("\n{champion}");
    codec::save(champion, "xor_champion.txt")?;
    Ok(())
}

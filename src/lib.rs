//! # Symbios Neuroevo
//!
//! Neuroevolution of small feed-forward networks. Each candidate is a
//! [`Genome`]: a directed acyclic graph of neurons joined by weighted,
//! biased synapses. A [`Simulation`] evolves a fixed-size population of
//! them with an elitist loop. It evaluates every agent in parallel, ranks
//! them, and replaces everything below the top third with mutated copies
//! of the survivors.
//!
//! ## Features
//!
//! - **Arena graph**: dense neuron ids plus a `SlotMap` of synapses, indexed
//!   by `(source, target)`
//! - **Cached evaluation order**: the topological order is compiled once per
//!   structure and dropped on every mutation
//! - **Growing topology**: edge splitting and edge insertion, always keeping
//!   the graph acyclic
//! - **Parallel evaluation**: fitness runs on rayon, with per-agent panic
//!   isolation and an optional generation deadline
//! - **Codec**: JSON and a plain-text line format, validated on load
//!
//! ## Quick Start
//!
//! ```rust
//! use symbios_neuroevo::{Activation, Genome, NeuronId};
//!
//! let mut genome = Genome::empty(2, 1, Activation::ReLU).unwrap();
//! genome.insert_synapse(NeuronId(0), NeuronId(2), 2.0, 0.5);
//! genome.insert_synapse(NeuronId(1), NeuronId(2), 3.0, 1.5);
//!
//! // relu((1 * 2 + 0.5) + (0 * 3 + 1.5))
//! assert_eq!(genome.forward(&[1.0, 0.0]).unwrap(), vec![4.0]);
//! ```
//!
//! ## Training
//!
//! ```rust
//! use symbios_neuroevo::{Activation, Genome, RankingMode, Simulation, SimulationConfig};
//!
//! let config = SimulationConfig {
//!     population_size: 30,
//!     max_iterations: 20,
//!     seed: Some(42),
//!     ..SimulationConfig::with_target(RankingMode::ClosestToTarget, 0.5)
//! };
//!
//! // Shared state: the input to feed every genome.
//! let sim = Simulation::new(config, 1, 1, Activation::Sigmoid, 2.0_f64).unwrap();
//! let outcome = sim
//!     .train(|genome: &Genome, x: &f64| genome.forward(&[*x]).map_or(f64::NAN, |o| o[0]))
//!     .unwrap();
//!
//! println!("best fitness {} after {} generations", outcome.best.fitness, outcome.generations);
//! ```
//!
//! ## Architecture
//!
//! Neuron ids are dense: `0..I` are inputs, `I..I+O` outputs, and hidden
//! neurons follow in creation order. A neuron's role is derived from its id,
//! so only synapses are stored. Synapses never leave an output or enter an
//! input, and every insertion is checked for cycles, so a single pass in
//! topological order evaluates the network.
//!
//! The library emits `tracing` events but never installs a subscriber.

pub mod activation;
pub mod codec;
pub mod error;
mod evaluator;
pub mod gene;
pub mod genome;
pub mod mutation;
pub mod population;
pub mod simulation;
pub mod topology;

// Re-exports for convenience
pub use activation::Activation;
pub use codec::{GenomeRecord, SynapseRecord};
pub use error::{Error, Result};
pub use gene::{Neuron, NeuronId, NeuronKind, Synapse, SynapseId, SynapseMut};
pub use genome::Genome;
pub use mutation::MutationRates;
pub use population::{Agent, Population};
pub use simulation::{
    FitnessFn, GenerationReport, RankingMode, Simulation, SimulationConfig, SuccessCallback,
    Termination, TrainingOutcome,
};
pub use topology::GraphTopology;

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_mutated_genome_survives_json() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut genome = Genome::new(3, 2, Activation::Tanh, &mut rng).unwrap();
        genome.mutate(30, &mut rng);

        let json = serde_json::to_string(&genome).unwrap();
        let restored: Genome = serde_json::from_str(&json).unwrap();

        assert_eq!(genome.neuron_count(), restored.neuron_count());
        assert_eq!(genome.synapse_count(), restored.synapse_count());
        assert_eq!(
            genome.forward(&[0.1, 0.2, 0.3]).unwrap(),
            restored.forward(&[0.1, 0.2, 0.3]).unwrap()
        );
    }

    #[test]
    fn test_mutation_keeps_graph_acyclic() {
        let mut rng = ChaCha8Rng::seed_from_u64(123);
        let mut genome = Genome::new(2, 2, Activation::ReLU, &mut rng).unwrap();
        for _ in 0..50 {
            genome.mutate(4, &mut rng);
            assert!(genome.is_acyclic());
            assert!(!GraphTopology::from_genome(&genome).has_cycle());
        }
    }
}

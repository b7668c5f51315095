//! Compiled forward-evaluation plan for a genome.
//!
//! An [`EvalPlan`] is the genome's cached topological order together with
//! the CSR incoming-edge lists used by the forward pass. It caches structure
//! only: weights and biases are read live from the genome's synapse arena, so
//! payload perturbations never leave the plan stale. Structural mutations
//! drop the plan and the next evaluation recompiles it from scratch.

use crate::gene::NeuronId;
use crate::genome::Genome;
use crate::topology::GraphTopology;

/// Topological order plus incoming-edge lists, ready for single-pass
/// evaluation.
#[derive(Debug, Clone)]
pub(crate) struct EvalPlan {
    topology: GraphTopology,
    /// Non-input neurons in topological order.
    eval_order: Vec<usize>,
}

impl EvalPlan {
    /// Compile the plan for the genome's current structure.
    pub(crate) fn compile(genome: &Genome) -> Self {
        let topology = GraphTopology::from_genome(genome);
        let order = topology.topological_order().unwrap_or_else(|| {
            // Every constructor and mutation keeps the graph acyclic.
            tracing::error!("cyclic genome reached the evaluator; falling back to id order");
            (0..genome.neuron_count()).map(NeuronId).collect()
        });

        let inputs = genome.inputs();
        let eval_order = order
            .into_iter()
            .map(NeuronId::index)
            .filter(|&idx| idx >= inputs)
            .collect();

        Self {
            topology,
            eval_order,
        }
    }

    /// Non-input neurons in the order they are evaluated.
    pub(crate) fn order(&self) -> &[usize] {
        &self.eval_order
    }

    /// Run the forward pass. `inputs.len()` must equal `genome.inputs()`.
    pub(crate) fn run(&self, genome: &Genome, inputs: &[f64]) -> Vec<f64> {
        let activation = genome.activation();
        let mut values = vec![0.0f64; self.topology.node_count()];
        values[..inputs.len()].copy_from_slice(inputs);

        for &node in &self.eval_order {
            let mut sum = 0.0;
            for (source, synapse_id) in self.topology.incoming(node) {
                if let Some(synapse) = genome.synapse_by_id(synapse_id) {
                    sum += synapse.contribution(values[source]);
                }
            }
            values[node] = activation.apply(sum);
        }

        let first_output = genome.inputs();
        values[first_output..first_output + genome.outputs()].to_vec()
    }
}

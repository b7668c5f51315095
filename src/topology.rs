//! Graph topology analysis using CSR format.
//!
//! [`GraphTopology`] is a snapshot of a genome's synapses in Compressed
//! Sparse Row form, indexed directly by dense neuron id. It is rebuilt
//! whenever the evaluation plan is recompiled and never updated in place.
//!
//! ## Determinism
//!
//! Edges are laid out in ascending `(source, target)` order, so the incoming
//! edges of every neuron are sorted by source id. Forward evaluation sums in
//! that order, which keeps floating-point results bit-identical across runs
//! and across clones with different mutation histories.

use std::collections::VecDeque;

use crate::gene::{NeuronId, SynapseId};
use crate::genome::Genome;

/// CSR-format graph topology.
#[derive(Debug, Clone)]
pub struct GraphTopology {
    /// Number of neurons in the graph.
    node_count: usize,
    /// CSR offsets for outgoing edges. Length = node_count + 1.
    fwd_offsets: Vec<usize>,
    /// Targets of outgoing edges, sorted by target within each source.
    fwd_targets: Vec<usize>,
    /// CSR offsets for incoming edges. Length = node_count + 1.
    rev_offsets: Vec<usize>,
    /// Sources of incoming edges, sorted by source within each target.
    rev_sources: Vec<usize>,
    /// Synapse keys parallel to `rev_sources`.
    rev_synapses: Vec<SynapseId>,
}

impl GraphTopology {
    /// Build topology from a genome's synapses.
    #[must_use]
    pub fn from_genome(genome: &Genome) -> Self {
        let node_count = genome.neuron_count();
        let edges: Vec<(usize, usize, SynapseId)> = genome
            .synapse_entries()
            .map(|(id, synapse)| (synapse.source().index(), synapse.target().index(), id))
            .collect();

        let fwd_offsets = offsets(node_count, edges.iter().map(|&(from, _, _)| from));
        let mut fwd_targets = vec![0usize; edges.len()];
        let mut fwd_write_pos = fwd_offsets[..node_count].to_vec();
        for &(from, to, _) in &edges {
            fwd_targets[fwd_write_pos[from]] = to;
            fwd_write_pos[from] += 1;
        }

        let rev_offsets = offsets(node_count, edges.iter().map(|&(_, to, _)| to));
        let mut rev_sources = vec![0usize; edges.len()];
        let mut rev_synapses = vec![SynapseId::default(); edges.len()];
        let mut rev_write_pos = rev_offsets[..node_count].to_vec();
        for &(from, to, id) in &edges {
            let pos = rev_write_pos[to];
            rev_sources[pos] = from;
            rev_synapses[pos] = id;
            rev_write_pos[to] += 1;
        }

        Self {
            node_count,
            fwd_offsets,
            fwd_targets,
            rev_offsets,
            rev_sources,
            rev_synapses,
        }
    }

    /// Number of neurons in the topology.
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Iterate over successors of a neuron, ascending.
    #[inline]
    pub fn successors(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        let start = self.fwd_offsets[idx];
        let end = self.fwd_offsets[idx + 1];
        self.fwd_targets[start..end].iter().copied()
    }

    /// Incoming edges of a neuron as `(source index, synapse key)`, ascending
    /// by source.
    #[inline]
    pub fn incoming(&self, idx: usize) -> impl Iterator<Item = (usize, SynapseId)> + '_ {
        let start = self.rev_offsets[idx];
        let end = self.rev_offsets[idx + 1];
        self.rev_sources[start..end]
            .iter()
            .copied()
            .zip(self.rev_synapses[start..end].iter().copied())
    }

    /// In-degree of every neuron.
    fn in_degrees(&self) -> Vec<usize> {
        (0..self.node_count)
            .map(|idx| self.rev_offsets[idx + 1] - self.rev_offsets[idx])
            .collect()
    }

    /// Kahn's algorithm over all neurons.
    ///
    /// Ready neurons are released in ascending id order, so the result is a
    /// deterministic function of the edge set. Returns `None` if the graph
    /// has a cycle.
    #[must_use]
    pub fn topological_order(&self) -> Option<Vec<NeuronId>> {
        let mut in_degree = self.in_degrees();

        let mut queue: VecDeque<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &deg)| deg == 0)
            .map(|(idx, _)| idx)
            .collect();

        let mut order = Vec::with_capacity(self.node_count);
        while let Some(u) = queue.pop_front() {
            order.push(NeuronId(u));
            for v in self.successors(u) {
                in_degree[v] -= 1;
                if in_degree[v] == 0 {
                    queue.push_back(v);
                }
            }
        }

        if order.len() == self.node_count {
            Some(order)
        } else {
            None
        }
    }

    /// Detect if the graph contains any cycle.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        self.topological_order().is_none()
    }
}

/// Prefix-sum offsets from per-edge endpoint indices.
fn offsets(node_count: usize, endpoints: impl Iterator<Item = usize>) -> Vec<usize> {
    let mut counts = vec![0usize; node_count];
    for idx in endpoints {
        counts[idx] += 1;
    }
    let mut offsets = Vec::with_capacity(node_count + 1);
    let mut total = 0usize;
    offsets.push(total);
    for count in counts {
        total += count;
        offsets.push(total);
    }
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::Activation;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn test_rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    #[test]
    fn test_topology_basic() {
        let mut rng = test_rng();
        let genome = Genome::new(2, 1, Activation::ReLU, &mut rng).unwrap();

        let topo = GraphTopology::from_genome(&genome);

        assert_eq!(topo.node_count(), 3);
        assert!(!topo.has_cycle());
        assert_eq!(topo.successors(0).collect::<Vec<_>>(), vec![2]);
        let sources: Vec<usize> = topo.incoming(2).map(|(src, _)| src).collect();
        assert_eq!(sources, vec![0, 1]);
    }

    #[test]
    fn test_incoming_sorted_by_source() {
        let mut genome = Genome::empty(3, 1, Activation::ReLU).unwrap();
        // Insert out of order; CSR must still list sources ascending.
        assert!(genome.insert_synapse(NeuronId(2), NeuronId(3), 1.0, 0.0));
        assert!(genome.insert_synapse(NeuronId(0), NeuronId(3), 1.0, 0.0));
        assert!(genome.insert_synapse(NeuronId(1), NeuronId(3), 1.0, 0.0));

        let topo = GraphTopology::from_genome(&genome);
        let sources: Vec<usize> = topo.incoming(3).map(|(src, _)| src).collect();
        assert_eq!(sources, vec![0, 1, 2]);
    }

    #[test]
    fn test_topological_order_respects_edges() {
        let mut rng = test_rng();
        let mut genome = Genome::new(2, 2, Activation::Tanh, &mut rng).unwrap();
        genome.split_edge_from(NeuronId(0), &mut rng);
        genome.split_edge_from(NeuronId(1), &mut rng);

        let topo = GraphTopology::from_genome(&genome);
        let order = topo.topological_order().expect("genome is acyclic");
        assert_eq!(order.len(), genome.neuron_count());

        let mut position = vec![0usize; order.len()];
        for (pos, id) in order.iter().enumerate() {
            position[id.index()] = pos;
        }
        for synapse in genome.synapses() {
            assert!(position[synapse.source().index()] < position[synapse.target().index()]);
        }
    }
}

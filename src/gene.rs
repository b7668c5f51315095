//! Neuron and synapse types.
//!
//! This module defines the fundamental building blocks of a genome:
//! - [`Neuron`]: a dense integer identity plus its role
//! - [`Synapse`]: a directed edge carrying its own weight and bias

use std::fmt;

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Arena key of a synapse within one genome.
    ///
    /// Keys are generational, so a key held across a split never resolves
    /// to the replacement edges.
    pub struct SynapseId;
}

/// Dense identity of a neuron.
///
/// Inputs occupy `[0, I)`, outputs `[I, I+O)` and hidden neurons are
/// numbered from `I+O` upward in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NeuronId(pub usize);

impl NeuronId {
    /// The id as an index into per-neuron buffers.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NeuronId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a neuron in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NeuronKind {
    /// Receives external values, no activation applied.
    Input,
    /// Produces the network output.
    Output,
    /// Internal neuron created by splitting a synapse.
    Hidden,
}

/// A neuron: identity and role. Neurons carry no other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Neuron {
    /// Dense identity.
    pub id: NeuronId,
    /// Role derived from the id and the genome's neuron counts.
    pub kind: NeuronKind,
}

/// A directed, weighted and biased edge.
///
/// Every incoming synapse contributes `source * weight + bias` to its
/// target's sum. The endpoints are fixed once the synapse is inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct Synapse {
    pub(crate) source: NeuronId,
    pub(crate) target: NeuronId,
    /// Multiplier applied to the source value.
    pub weight: f64,
    /// Additive term contributed by this edge.
    pub bias: f64,
}

impl Synapse {
    #[must_use]
    pub(crate) fn new(source: NeuronId, target: NeuronId, weight: f64, bias: f64) -> Self {
        Self {
            source,
            target,
            weight,
            bias,
        }
    }

    /// Source neuron.
    #[inline]
    #[must_use]
    pub const fn source(&self) -> NeuronId {
        self.source
    }

    /// Target neuron.
    #[inline]
    #[must_use]
    pub const fn target(&self) -> NeuronId {
        self.target
    }

    /// Contribution of this edge given its source's value.
    #[inline]
    #[must_use]
    pub fn contribution(&self, source_value: f64) -> f64 {
        source_value * self.weight + self.bias
    }
}

/// Mutable view of a synapse's weight and bias.
///
/// Handed out by [`Genome::synapse_mut`](crate::Genome::synapse_mut); the
/// endpoints are not reachable through it.
#[derive(Debug)]
pub struct SynapseMut<'a> {
    /// Multiplier applied to the source value.
    pub weight: &'a mut f64,
    /// Additive term contributed by this edge.
    pub bias: &'a mut f64,
}

impl<'a> From<&'a mut Synapse> for SynapseMut<'a> {
    fn from(synapse: &'a mut Synapse) -> Self {
        Self {
            weight: &mut synapse.weight,
            bias: &mut synapse.bias,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synapse_creation() {
        let synapse = Synapse::new(NeuronId(0), NeuronId(2), 0.5, -1.0);
        assert_eq!(synapse.source(), NeuronId(0));
        assert_eq!(synapse.target(), NeuronId(2));
        assert!((synapse.weight - 0.5).abs() < 1e-12);
        assert!((synapse.bias + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_contribution_includes_edge_bias() {
        let synapse = Synapse::new(NeuronId(0), NeuronId(1), 2.0, 0.5);
        assert!((synapse.contribution(1.0) - 2.5).abs() < 1e-12);
        assert!((synapse.contribution(0.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_neuron_id_ordering() {
        let mut ids = vec![NeuronId(3), NeuronId(0), NeuronId(2)];
        ids.sort();
        assert_eq!(ids, vec![NeuronId(0), NeuronId(2), NeuronId(3)]);
        assert_eq!(NeuronId(7).index(), 7);
    }
}

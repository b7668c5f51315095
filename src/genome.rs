//! Genome implementation with arena-allocated graph topology.
//!
//! A [`Genome`] is a directed acyclic graph of densely numbered neurons and
//! weighted, biased synapses. Synapse payloads live in a `SlotMap` arena and
//! a `(source, target)` index maps each ordered pair to its arena key, so
//! cloning is a flat deep copy and no edge ever aliases another genome's.
//!
//! The topological order needed for forward evaluation is cached lazily in a
//! `OnceLock`, which lets any number of threads evaluate the same genome
//! through a shared reference. Every structural change drops the cache.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::OnceLock;

use rand::Rng;
use rand_distr::StandardNormal;
use serde::Deserialize;
use slotmap::SlotMap;

use crate::activation::Activation;
use crate::codec::GenomeRecord;
use crate::error::{Error, Result};
use crate::evaluator::EvalPlan;
use crate::gene::{Neuron, NeuronId, NeuronKind, Synapse, SynapseId, SynapseMut};
use crate::topology::GraphTopology;

/// A feed-forward network whose topology evolves by mutation.
///
/// Invariants:
/// - at most one synapse per ordered `(source, target)` pair;
/// - synapses never target an input, never leave an output, never loop;
/// - the synapse set is acyclic.
#[derive(Debug, Deserialize)]
#[serde(try_from = "GenomeRecord")]
pub struct Genome {
    inputs: usize,
    outputs: usize,
    hidden: usize,
    activation: Activation,
    /// Arena storage for synapse payloads.
    synapses: SlotMap<SynapseId, Synapse>,
    /// `(source, target)` index over the arena, ordered by source then target.
    edges: BTreeMap<(NeuronId, NeuronId), SynapseId>,
    /// Cached evaluation plan; empty until the next forward pass.
    plan: OnceLock<EvalPlan>,
}

impl Clone for Genome {
    /// Deep copy of every synapse. The clone starts without a cached order.
    fn clone(&self) -> Self {
        Self {
            inputs: self.inputs,
            outputs: self.outputs,
            hidden: self.hidden,
            activation: self.activation,
            synapses: self.synapses.clone(),
            edges: self.edges.clone(),
            plan: OnceLock::new(),
        }
    }
}

impl Genome {
    /// Create a genome with input and output neurons but no synapses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDimensions`] if `inputs` or `outputs` is zero
    /// or their sum overflows.
    pub fn empty(inputs: usize, outputs: usize, activation: Activation) -> Result<Self> {
        if inputs == 0 || outputs == 0 || inputs.checked_add(outputs).is_none() {
            return Err(Error::InvalidDimensions { inputs, outputs });
        }
        Ok(Self {
            inputs,
            outputs,
            hidden: 0,
            activation,
            synapses: SlotMap::with_key(),
            edges: BTreeMap::new(),
            plan: OnceLock::new(),
        })
    }

    /// Create a fully-connected genome: every input feeds every output.
    ///
    /// Each of the `inputs * outputs` synapses gets a weight and a bias drawn
    /// independently from a standard normal distribution.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDimensions`] if `inputs` or `outputs` is zero.
    pub fn new<R: Rng>(
        inputs: usize,
        outputs: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Result<Self> {
        let mut genome = Self::empty(inputs, outputs, activation)?;
        for source in 0..inputs {
            for target in inputs..inputs + outputs {
                let weight: f64 = rng.sample(StandardNormal);
                let bias: f64 = rng.sample(StandardNormal);
                genome.link(NeuronId(source), NeuronId(target), weight, bias);
            }
        }
        Ok(genome)
    }

    /// Number of input neurons.
    #[inline]
    #[must_use]
    pub const fn inputs(&self) -> usize {
        self.inputs
    }

    /// Number of output neurons.
    #[inline]
    #[must_use]
    pub const fn outputs(&self) -> usize {
        self.outputs
    }

    /// Number of hidden neurons created so far.
    #[inline]
    #[must_use]
    pub const fn hidden(&self) -> usize {
        self.hidden
    }

    /// Total number of neurons.
    #[inline]
    #[must_use]
    pub const fn neuron_count(&self) -> usize {
        self.inputs + self.outputs + self.hidden
    }

    /// The activation applied to every non-input neuron.
    #[inline]
    #[must_use]
    pub const fn activation(&self) -> Activation {
        self.activation
    }

    /// Role of a neuron, or `None` if the id is out of range.
    #[must_use]
    pub fn kind_of(&self, id: NeuronId) -> Option<NeuronKind> {
        let idx = id.index();
        if idx < self.inputs {
            Some(NeuronKind::Input)
        } else if idx < self.inputs + self.outputs {
            Some(NeuronKind::Output)
        } else if idx < self.neuron_count() {
            Some(NeuronKind::Hidden)
        } else {
            None
        }
    }

    /// Look up a neuron by id.
    #[must_use]
    pub fn neuron(&self, id: NeuronId) -> Option<Neuron> {
        self.kind_of(id).map(|kind| Neuron { id, kind })
    }

    /// All neurons in id order.
    pub fn neurons(&self) -> impl Iterator<Item = Neuron> + '_ {
        (0..self.neuron_count()).filter_map(|idx| self.neuron(NeuronId(idx)))
    }

    /// Number of synapses.
    #[inline]
    #[must_use]
    pub fn synapse_count(&self) -> usize {
        self.synapses.len()
    }

    /// All synapses in ascending `(source, target)` order.
    pub fn synapses(&self) -> impl Iterator<Item = &Synapse> + '_ {
        self.synapse_entries().map(|(_, synapse)| synapse)
    }

    /// Arena keys and synapses in ascending `(source, target)` order.
    pub(crate) fn synapse_entries(&self) -> impl Iterator<Item = (SynapseId, &Synapse)> + '_ {
        self.edges
            .values()
            .filter_map(|&id| self.synapses.get(id).map(|synapse| (id, synapse)))
    }

    #[inline]
    pub(crate) fn synapse_by_id(&self, id: SynapseId) -> Option<&Synapse> {
        self.synapses.get(id)
    }

    #[inline]
    pub(crate) fn synapse_by_id_mut(&mut self, id: SynapseId) -> Option<&mut Synapse> {
        self.synapses.get_mut(id)
    }

    /// The synapse between two neurons, if any.
    #[must_use]
    pub fn synapse(&self, source: NeuronId, target: NeuronId) -> Option<&Synapse> {
        self.edges
            .get(&(source, target))
            .and_then(|&id| self.synapses.get(id))
    }

    /// Mutable access to a synapse's weight and bias.
    ///
    /// Only the payload is exposed, so the edge index and the cached order
    /// stay valid.
    pub fn synapse_mut(
        &mut self,
        source: NeuronId,
        target: NeuronId,
    ) -> Option<SynapseMut<'_>> {
        let id = *self.edges.get(&(source, target))?;
        self.synapses.get_mut(id).map(SynapseMut::from)
    }

    /// Outgoing synapses of `source`, ascending by target.
    pub fn outgoing(&self, source: NeuronId) -> impl Iterator<Item = &Synapse> + '_ {
        self.outgoing_ids(source)
            .into_iter()
            .filter_map(|id| self.synapses.get(id))
    }

    /// Arena keys of the outgoing synapses of `source`, ascending by target.
    pub(crate) fn outgoing_ids(&self, source: NeuronId) -> Vec<SynapseId> {
        self.edges
            .range((source, NeuronId(0))..=(source, NeuronId(usize::MAX)))
            .map(|(_, &id)| id)
            .collect()
    }

    /// Whether a new synapse `source -> target` would be accepted.
    ///
    /// The endpoints must exist, the target must not be an input, the source
    /// must not be an output, the pair must not be connected yet, and the
    /// edge must not close a cycle.
    #[must_use]
    pub fn can_connect(&self, source: NeuronId, target: NeuronId) -> bool {
        let (Some(source_kind), Some(target_kind)) = (self.kind_of(source), self.kind_of(target))
        else {
            return false;
        };
        if source_kind == NeuronKind::Output || target_kind == NeuronKind::Input {
            return false;
        }
        if self.edges.contains_key(&(source, target)) {
            return false;
        }
        !self.would_create_cycle(source, target)
    }

    /// Insert a synapse if [`can_connect`](Self::can_connect) allows it.
    ///
    /// Returns `false`, leaving the genome untouched, when the edge is
    /// rejected.
    pub fn insert_synapse(
        &mut self,
        source: NeuronId,
        target: NeuronId,
        weight: f64,
        bias: f64,
    ) -> bool {
        if !self.can_connect(source, target) {
            return false;
        }
        self.link(source, target, weight, bias);
        true
    }

    /// Insert without validation. Callers guarantee the invariants.
    fn link(&mut self, source: NeuronId, target: NeuronId, weight: f64, bias: f64) {
        let id = self
            .synapses
            .insert(Synapse::new(source, target, weight, bias));
        self.edges.insert((source, target), id);
        self.invalidate();
    }

    /// Remove the synapse between two neurons.
    pub(crate) fn remove_synapse(&mut self, source: NeuronId, target: NeuronId) -> Option<Synapse> {
        let id = self.edges.remove(&(source, target))?;
        self.invalidate();
        self.synapses.remove(id)
    }

    /// Allocate the next hidden neuron.
    pub(crate) fn push_hidden(&mut self) -> NeuronId {
        let id = NeuronId(self.neuron_count());
        self.hidden += 1;
        self.invalidate();
        id
    }

    /// Allocate `count` hidden neurons at once. Returns `false`, leaving the
    /// genome untouched, if the neuron count would overflow.
    pub(crate) fn extend_hidden(&mut self, count: usize) -> bool {
        if self.neuron_count().checked_add(count).is_none() {
            return false;
        }
        self.hidden += count;
        self.invalidate();
        true
    }

    /// Whether adding `source -> target` would close a cycle, i.e. whether
    /// `source` is already reachable from `target`.
    fn would_create_cycle(&self, source: NeuronId, target: NeuronId) -> bool {
        if source == target {
            return true;
        }

        // Only neurons reachable from `target` are visited.
        let mut visited = BTreeSet::new();
        let mut stack = vec![target];
        while let Some(current) = stack.pop() {
            if current == source {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            for (&(_, next), _) in self
                .edges
                .range((current, NeuronId(0))..=(current, NeuronId(usize::MAX)))
            {
                if !visited.contains(&next) {
                    stack.push(next);
                }
            }
        }

        false
    }

    /// Drop the cached evaluation plan.
    #[inline]
    pub(crate) fn invalidate(&mut self) {
        self.plan.take();
    }

    /// Whether an evaluation plan is currently cached.
    #[must_use]
    pub fn is_order_cached(&self) -> bool {
        self.plan.get().is_some()
    }

    fn plan(&self) -> &EvalPlan {
        self.plan.get_or_init(|| EvalPlan::compile(self))
    }

    /// Evaluate the network on one input vector.
    ///
    /// Incoming synapses are summed in ascending source order, so repeated
    /// calls on the same genome and input are bit-identical.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `input.len()` differs from
    /// the number of input neurons.
    pub fn forward(&self, input: &[f64]) -> Result<Vec<f64>> {
        if input.len() != self.inputs {
            return Err(Error::DimensionMismatch {
                expected: self.inputs,
                actual: input.len(),
            });
        }
        Ok(self.plan().run(self, input))
    }

    /// A freshly computed topological order of all neurons, or `None` if
    /// the graph has a cycle.
    #[must_use]
    pub fn topological_order(&self) -> Option<Vec<NeuronId>> {
        GraphTopology::from_genome(self).topological_order()
    }

    /// Whether the synapse set is acyclic.
    #[must_use]
    pub fn is_acyclic(&self) -> bool {
        !GraphTopology::from_genome(self).has_cycle()
    }
}

impl fmt::Display for Genome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "genome: {} inputs, {} outputs, {} hidden, {}",
            self.inputs, self.outputs, self.hidden, self.activation
        )?;
        for synapse in self.synapses() {
            writeln!(
                f,
                "{} -> {}: weight={}, bias={}",
                synapse.source, synapse.target, synapse.weight, synapse.bias
            )?;
        }
        Ok(())
    }
}

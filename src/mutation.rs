//! Mutation operators.
//!
//! [`Genome::mutate`] runs a number of trials. Each trial draws a single
//! `r` in `[0, 1)` and tests it against all four [`MutationRates`]
//! thresholds in turn, so a low draw fires several operators at once (with
//! the default rates any `r < 0.1` splits, adds, and perturbs both weight and
//! bias).
//!
//! Every operator starts from a source neuron drawn uniformly from the
//! non-output neurons and works on one of its outgoing synapses. A source
//! without outgoing synapses makes the operator a no-op.

use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Error, Result};
use crate::gene::{NeuronId, Synapse, SynapseId};
use crate::genome::Genome;

/// Per-trial thresholds for the four mutation operators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MutationRates {
    /// Threshold for splitting a synapse with a new hidden neuron.
    pub split_edge: f64,
    /// Threshold for adding a synapse.
    pub add_edge: f64,
    /// Threshold for perturbing a weight.
    pub perturb_weight: f64,
    /// Threshold for perturbing a bias.
    pub perturb_bias: f64,
}

impl Default for MutationRates {
    fn default() -> Self {
        Self {
            split_edge: 0.1,
            add_edge: 0.2,
            perturb_weight: 0.5,
            perturb_bias: 0.2,
        }
    }
}

impl MutationRates {
    /// Rates that only ever perturb weights and biases.
    #[must_use]
    pub fn weights_only() -> Self {
        Self {
            split_edge: 0.0,
            add_edge: 0.0,
            ..Self::default()
        }
    }

    /// Check every threshold lies in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first bad threshold.
    pub fn validate(&self) -> Result<()> {
        let rates = [
            ("split_edge", self.split_edge),
            ("add_edge", self.add_edge),
            ("perturb_weight", self.perturb_weight),
            ("perturb_bias", self.perturb_bias),
        ];
        for (name, rate) in rates {
            if !(0.0..=1.0).contains(&rate) {
                return Err(Error::InvalidConfig(format!(
                    "mutation rate `{name}` must be within [0, 1], got {rate}"
                )));
            }
        }
        Ok(())
    }
}

impl Genome {
    /// Run `intensity` mutation trials with the default rates.
    pub fn mutate<R: Rng>(&mut self, intensity: usize, rng: &mut R) {
        self.mutate_with(intensity, &MutationRates::default(), rng);
    }

    /// Run `intensity` mutation trials with explicit rates.
    ///
    /// The cached topological order is dropped afterwards whether or not
    /// any trial changed the graph.
    pub fn mutate_with<R: Rng>(&mut self, intensity: usize, rates: &MutationRates, rng: &mut R) {
        for _ in 0..intensity {
            let r: f64 = rng.random();
            if r < rates.split_edge {
                self.split_edge(rng);
            }
            if r < rates.add_edge {
                self.add_edge(rng);
            }
            if r < rates.perturb_weight {
                self.perturb_weight(rng);
            }
            if r < rates.perturb_bias {
                self.perturb_bias(rng);
            }
        }
        self.invalidate();
    }

    /// Split an outgoing synapse of a random non-output neuron.
    pub fn split_edge<R: Rng>(&mut self, rng: &mut R) -> Option<NeuronId> {
        let source = self.random_source(rng);
        self.split_edge_from(source, rng)
    }

    /// Replace one outgoing synapse `source -> to` of `source` by
    /// `source -> new` (weight 1, bias 0) and `new -> to` (the original
    /// weight and bias).
    ///
    /// Returns the new hidden neuron, or `None` if `source` has no outgoing
    /// synapse.
    pub fn split_edge_from<R: Rng>(&mut self, source: NeuronId, rng: &mut R) -> Option<NeuronId> {
        let id = self.random_outgoing(source, rng)?;
        let (from, to, weight, bias) = {
            let synapse = self.synapse_by_id(id)?;
            (synapse.source(), synapse.target(), synapse.weight, synapse.bias)
        };

        self.remove_synapse(from, to);
        let hidden = self.push_hidden();
        // The split edge existed, so `to` cannot reach `from`: both inserts succeed.
        let linked = self.insert_synapse(from, hidden, 1.0, 0.0)
            && self.insert_synapse(hidden, to, weight, bias);
        debug_assert!(linked, "splitting {from} -> {to} must keep the graph valid");

        trace!(%from, %to, %hidden, "split synapse");
        Some(hidden)
    }

    /// Try to add a synapse starting at a random non-output neuron.
    pub fn add_edge<R: Rng>(&mut self, rng: &mut R) -> bool {
        let source = self.random_source(rng);
        self.add_edge_from(source, rng)
    }

    /// Sample an outgoing synapse of `source` and try to insert a new
    /// synapse between the same endpoints with fresh normal weight and bias.
    ///
    /// The endpoints come from an existing synapse, so the insert is
    /// rejected as a duplicate unless that synapse is gone. Returns whether
    /// a synapse was inserted.
    pub fn add_edge_from<R: Rng>(&mut self, source: NeuronId, rng: &mut R) -> bool {
        let Some(id) = self.random_outgoing(source, rng) else {
            return false;
        };
        let Some((from, to)) = self
            .synapse_by_id(id)
            .map(|synapse| (synapse.source(), synapse.target()))
        else {
            return false;
        };

        let weight: f64 = rng.sample(StandardNormal);
        let bias: f64 = rng.sample(StandardNormal);
        let inserted = self.insert_synapse(from, to, weight, bias);
        if inserted {
            trace!(%from, %to, "added synapse");
        }
        inserted
    }

    /// Perturb the weight of an outgoing synapse of a random non-output
    /// neuron.
    pub fn perturb_weight<R: Rng>(&mut self, rng: &mut R) -> bool {
        let source = self.random_source(rng);
        self.perturb_weight_from(source, rng)
    }

    /// Add a standard normal sample to the weight of one outgoing synapse of
    /// `source`. Returns `false` if `source` has none.
    pub fn perturb_weight_from<R: Rng>(&mut self, source: NeuronId, rng: &mut R) -> bool {
        self.perturb_from(source, rng, |synapse, delta| synapse.weight += delta)
    }

    /// Perturb the bias of an outgoing synapse of a random non-output
    /// neuron.
    pub fn perturb_bias<R: Rng>(&mut self, rng: &mut R) -> bool {
        let source = self.random_source(rng);
        self.perturb_bias_from(source, rng)
    }

    /// Add a standard normal sample to the bias of one outgoing synapse of
    /// `source`. Returns `false` if `source` has none.
    pub fn perturb_bias_from<R: Rng>(&mut self, source: NeuronId, rng: &mut R) -> bool {
        self.perturb_from(source, rng, |synapse, delta| synapse.bias += delta)
    }

    fn perturb_from<R: Rng>(
        &mut self,
        source: NeuronId,
        rng: &mut R,
        apply: impl FnOnce(&mut Synapse, f64),
    ) -> bool {
        let Some(id) = self.random_outgoing(source, rng) else {
            return false;
        };
        let delta: f64 = rng.sample(StandardNormal);
        match self.synapse_by_id_mut(id) {
            Some(synapse) => {
                apply(synapse, delta);
                true
            }
            None => false,
        }
    }

    /// Uniform draw over inputs and hidden neurons.
    fn random_source<R: Rng>(&self, rng: &mut R) -> NeuronId {
        let mut n = rng.random_range(0..self.inputs() + self.hidden());
        if n >= self.inputs() {
            n += self.outputs();
        }
        NeuronId(n)
    }

    /// Uniform draw over the outgoing synapses of `source`.
    fn random_outgoing<R: Rng>(&self, source: NeuronId, rng: &mut R) -> Option<SynapseId> {
        let outgoing = self.outgoing_ids(source);
        if outgoing.is_empty() {
            return None;
        }
        Some(outgoing[rng.random_range(0..outgoing.len())])
    }
}

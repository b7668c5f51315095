//! Agents and populations.

use std::cmp::Ordering;
use std::ops::Index;

use rand::Rng;

use crate::activation::Activation;
use crate::error::Result;
use crate::genome::Genome;
use crate::simulation::RankingMode;

/// A genome paired with its most recently computed fitness.
#[derive(Debug, Clone)]
pub struct Agent {
    /// The candidate solution, owned exclusively by this agent.
    pub genome: Genome,
    /// Last computed fitness; zero until first evaluated.
    pub fitness: f64,
}

impl Agent {
    /// Wrap a genome with zero fitness.
    #[must_use]
    pub fn new(genome: Genome) -> Self {
        Self {
            genome,
            fitness: 0.0,
        }
    }
}

/// An ordered, fixed-size collection of agents.
///
/// The order only means something right after [`rank`](Self::rank).
#[derive(Debug, Clone)]
pub struct Population {
    agents: Vec<Agent>,
}

impl Population {
    /// Create `size` fully-connected random genomes.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::Error::InvalidDimensions`] from genome
    /// construction.
    pub fn new<R: Rng>(
        size: usize,
        inputs: usize,
        outputs: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Result<Self> {
        let agents = (0..size)
            .map(|_| Genome::new(inputs, outputs, activation, rng).map(Agent::new))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { agents })
    }

    /// Build a population from existing genomes, e.g. loaded from disk.
    #[must_use]
    pub fn from_genomes(genomes: impl IntoIterator<Item = Genome>) -> Self {
        Self {
            agents: genomes.into_iter().map(Agent::new).collect(),
        }
    }

    /// Number of agents.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the population has no agents.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// The agent in slot 0: the best one right after ranking.
    #[must_use]
    pub fn best(&self) -> Option<&Agent> {
        self.agents.first()
    }

    /// Iterate over agents in slot order.
    pub fn iter(&self) -> std::slice::Iter<'_, Agent> {
        self.agents.iter()
    }

    /// Agents as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Agent] {
        &self.agents
    }

    pub(crate) fn agents_mut(&mut self) -> &mut [Agent] {
        &mut self.agents
    }

    pub(crate) fn replace(&mut self, agents: Vec<Agent>) {
        self.agents = agents;
    }

    pub(crate) fn take(&mut self) -> Vec<Agent> {
        std::mem::take(&mut self.agents)
    }

    /// Stable sort, best first, under `mode`.
    pub fn rank(&mut self, mode: RankingMode, target: f64) {
        self.agents
            .sort_by(|a, b| compare(mode, target, a.fitness, b.fitness));
    }
}

/// Ordering of two fitness values, best first.
fn compare(mode: RankingMode, target: f64, a: f64, b: f64) -> Ordering {
    match mode {
        RankingMode::Highest => b.total_cmp(&a),
        RankingMode::Lowest => a.total_cmp(&b),
        RankingMode::ClosestToTarget => (a - target).abs().total_cmp(&(b - target).abs()),
    }
}

impl Index<usize> for Population {
    type Output = Agent;

    fn index(&self, idx: usize) -> &Agent {
        &self.agents[idx]
    }
}

impl<'a> IntoIterator for &'a Population {
    type Item = &'a Agent;
    type IntoIter = std::slice::Iter<'a, Agent>;

    fn into_iter(self) -> Self::IntoIter {
        self.agents.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn population_with(fitness: &[f64]) -> Population {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut population = Population::new(fitness.len(), 1, 1, Activation::ReLU, &mut rng).unwrap();
        for (agent, &value) in population.agents_mut().iter_mut().zip(fitness) {
            agent.fitness = value;
        }
        population
    }

    fn fitness_of(population: &Population) -> Vec<f64> {
        population.iter().map(|agent| agent.fitness).collect()
    }

    #[test]
    fn test_new_population() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let population = Population::new(6, 2, 3, Activation::Tanh, &mut rng).unwrap();
        assert_eq!(population.len(), 6);
        for agent in &population {
            assert_eq!(agent.genome.synapse_count(), 6);
            assert_eq!(agent.fitness, 0.0);
        }
    }

    #[test]
    fn test_new_population_rejects_bad_dimensions() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(Population::new(3, 0, 1, Activation::ReLU, &mut rng).is_err());
    }

    #[test]
    fn test_rank_highest_and_lowest() {
        let mut population = population_with(&[0.5, 3.0, -1.0, 2.0]);
        population.rank(RankingMode::Highest, 0.0);
        assert_eq!(fitness_of(&population), vec![3.0, 2.0, 0.5, -1.0]);

        population.rank(RankingMode::Lowest, 0.0);
        assert_eq!(fitness_of(&population), vec![-1.0, 0.5, 2.0, 3.0]);
    }

    #[test]
    fn test_rank_closest_to_target() {
        let mut population = population_with(&[0.0, 1.2, 0.9, 5.0]);
        population.rank(RankingMode::ClosestToTarget, 1.0);
        assert_eq!(fitness_of(&population), vec![0.9, 1.2, 0.0, 5.0]);
    }

    #[test]
    fn test_rank_is_stable() {
        let mut population = population_with(&[1.0, 1.0, 1.0]);
        let before: Vec<String> = population.iter().map(|a| a.genome.to_string()).collect();
        population.rank(RankingMode::Highest, 0.0);
        let after: Vec<String> = population.iter().map(|a| a.genome.to_string()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_sentinels_rank_last() {
        let mut population = population_with(&[f64::NEG_INFINITY, 0.1, -7.0]);
        population.rank(RankingMode::Highest, 0.0);
        assert_eq!(population[2].fitness, f64::NEG_INFINITY);

        let mut population = population_with(&[f64::INFINITY, 40.0, 0.3]);
        population.rank(RankingMode::ClosestToTarget, 0.0);
        assert_eq!(population[2].fitness, f64::INFINITY);
    }
}

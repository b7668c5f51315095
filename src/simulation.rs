//! The elitist evolutionary loop.
//!
//! Each generation runs four phases: evaluate every agent in parallel,
//! rank, refill the non-elite slots with mutated copies of the elite, and
//! check the success condition. Evaluation fans out over rayon; everything
//! else runs on the calling thread, which also owns the breeding RNG.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::activation::Activation;
use crate::error::{Error, Result};
use crate::genome::Genome;
use crate::mutation::MutationRates;
use crate::population::{Agent, Population};

/// Distance under which `ClosestToTarget` counts as a hit.
const TARGET_TOLERANCE: f64 = 1e-4;

/// How a population is ordered by fitness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RankingMode {
    /// Larger fitness is better.
    #[default]
    Highest,
    /// Smaller fitness is better.
    Lowest,
    /// Fitness nearest to the configured target is better.
    ClosestToTarget,
}

impl RankingMode {
    /// Fitness assigned to agents whose evaluation failed or was skipped.
    /// Always ranks at or below every real score.
    #[must_use]
    pub fn sentinel(self) -> f64 {
        match self {
            Self::Highest => f64::NEG_INFINITY,
            Self::Lowest | Self::ClosestToTarget => f64::INFINITY,
        }
    }

    /// Whether `best` satisfies the success condition against `target`.
    #[must_use]
    pub fn is_success(self, best: f64, target: f64) -> bool {
        match self {
            Self::Highest => best >= target,
            Self::Lowest => best <= target,
            Self::ClosestToTarget => (best - target).abs() < TARGET_TOLERANCE,
        }
    }
}

/// Parameters for a [`Simulation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of agents per generation. Must be at least 3.
    pub population_size: usize,
    /// Mutation trials applied to every bred child.
    pub mutation_intensity: usize,
    /// Generation budget for one call to `run`/`train`.
    pub max_iterations: usize,
    /// Comparator used to rank agents.
    pub ranking: RankingMode,
    /// Target fitness for the success condition.
    pub target_value: f64,
    /// Per-trial operator thresholds.
    pub mutation_rates: MutationRates,
    /// Deadline for starting evaluation tasks within one generation.
    pub generation_timeout: Option<Duration>,
    /// Seed for the breeding RNG. `None` seeds from the thread RNG.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            mutation_intensity: 2,
            max_iterations: 1000,
            ranking: RankingMode::Highest,
            target_value: 0.0,
            mutation_rates: MutationRates::default(),
            generation_timeout: None,
            seed: None,
        }
    }
}

impl SimulationConfig {
    /// Config that ranks by `ranking` and succeeds at `target_value`.
    #[must_use]
    pub fn with_target(ranking: RankingMode, target_value: f64) -> Self {
        Self {
            ranking,
            target_value,
            ..Self::default()
        }
    }

    /// Number of agents that survive each generation unchanged.
    #[must_use]
    pub fn elite_count(&self) -> usize {
        self.population_size / 3
    }

    /// Check every field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.population_size < 3 {
            return Err(Error::InvalidConfig(format!(
                "population_size must be at least 3, got {}",
                self.population_size
            )));
        }
        if !self.target_value.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "target_value must be finite, got {}",
                self.target_value
            )));
        }
        if self.generation_timeout == Some(Duration::ZERO) {
            return Err(Error::InvalidConfig(
                "generation_timeout must be non-zero when set".into(),
            ));
        }
        self.mutation_rates.validate()
    }
}

/// Scores a genome against the shared state.
///
/// Called concurrently from rayon workers. A panic or a NaN result marks
/// the agent as failed for that generation.
pub trait FitnessFn<S>: Send + Sync {
    /// Fitness of `genome` under `state`.
    fn evaluate(&self, genome: &Genome, state: &S) -> f64;
}

impl<S, F> FitnessFn<S> for F
where
    F: Fn(&Genome, &S) -> f64 + Send + Sync,
{
    fn evaluate(&self, genome: &Genome, state: &S) -> f64 {
        self(genome, state)
    }
}

/// Invoked on the coordinating thread when the best agent meets the target.
///
/// Returns the state for the next generation and whether to stop.
pub trait SuccessCallback<S> {
    /// React to a successful generation.
    fn on_success(&mut self, best_fitness: f64, state: &S) -> (S, bool);
}

impl<S, F> SuccessCallback<S> for F
where
    F: FnMut(f64, &S) -> (S, bool),
{
    fn on_success(&mut self, best_fitness: f64, state: &S) -> (S, bool) {
        self(best_fitness, state)
    }
}

/// Why training ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// `max_iterations` generations ran without a stop request.
    BudgetExhausted,
    /// The success callback asked to stop.
    SuccessStop,
    /// A stop predicate accepted the best fitness.
    StopCondition,
}

/// Summary of a single generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationReport {
    /// 1-based generation number since the simulation was created.
    pub generation: usize,
    /// Fitness of the top-ranked agent.
    pub best_fitness: f64,
    /// Agents whose fitness call panicked or returned NaN.
    pub failed_evaluations: usize,
    /// Agents not evaluated before the generation deadline.
    pub skipped_evaluations: usize,
    /// Whether the success callback requested termination.
    pub stop: bool,
}

/// Result of [`Simulation::train`].
#[derive(Debug, Clone)]
pub struct TrainingOutcome<S> {
    /// Top-ranked agent of the final generation.
    pub best: Agent,
    /// Shared state after the last callback.
    pub state: S,
    /// Why the loop ended.
    pub termination: Termination,
    /// Generations completed in this run.
    pub generations: usize,
}

enum Evaluation {
    Scored,
    Failed,
    Skipped,
}

fn breeding_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_rng(&mut rand::rng()),
    }
}

/// Owns a population, the shared state and the breeding RNG.
#[derive(Debug)]
pub struct Simulation<S> {
    config: SimulationConfig,
    population: Population,
    state: S,
    rng: ChaCha8Rng,
    generation: usize,
}

impl<S> Simulation<S>
where
    S: Sync,
{
    /// Build a random initial population of fully connected genomes.
    ///
    /// # Errors
    ///
    /// Fails on an invalid config or zero inputs/outputs.
    pub fn new(
        config: SimulationConfig,
        inputs: usize,
        outputs: usize,
        activation: Activation,
        state: S,
    ) -> Result<Self> {
        config.validate()?;
        let mut rng = breeding_rng(config.seed);
        let population =
            Population::new(config.population_size, inputs, outputs, activation, &mut rng)?;
        Ok(Self {
            config,
            population,
            state,
            rng,
            generation: 0,
        })
    }

    /// Start from an existing population, e.g. genomes loaded from disk.
    ///
    /// # Errors
    ///
    /// Fails on an invalid config or if the population size differs from
    /// `config.population_size`.
    pub fn with_population(
        config: SimulationConfig,
        population: Population,
        state: S,
    ) -> Result<Self> {
        config.validate()?;
        if population.len() != config.population_size {
            return Err(Error::InvalidConfig(format!(
                "population has {} agents but population_size is {}",
                population.len(),
                config.population_size
            )));
        }
        let rng = breeding_rng(config.seed);
        Ok(Self {
            config,
            population,
            state,
            rng,
            generation: 0,
        })
    }

    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Mutable access to the config. Re-validated on the next `run`.
    pub fn config_mut(&mut self) -> &mut SimulationConfig {
        &mut self.config
    }

    #[must_use]
    pub fn population(&self) -> &Population {
        &self.population
    }

    #[must_use]
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Generations completed since construction.
    #[must_use]
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Run one generation: evaluate, rank, breed, check success.
    pub fn step<F>(
        &mut self,
        fitness: &F,
        callback: Option<&mut dyn SuccessCallback<S>>,
    ) -> GenerationReport
    where
        F: FitnessFn<S> + ?Sized,
    {
        let (failed, skipped) = self.evaluate(fitness);
        self.population
            .rank(self.config.ranking, self.config.target_value);
        self.breed();
        self.generation += 1;

        let best_fitness = self
            .population
            .best()
            .map_or(self.config.ranking.sentinel(), |a| a.fitness);
        let mut stop = false;
        if let Some(callback) = callback {
            if self.config.ranking.is_success(best_fitness, self.config.target_value) {
                let (state, requested) = callback.on_success(best_fitness, &self.state);
                self.state = state;
                stop = requested;
            }
        }

        debug!(
            generation = self.generation,
            best_fitness,
            failed,
            skipped,
            stop,
            "generation complete"
        );
        GenerationReport {
            generation: self.generation,
            best_fitness,
            failed_evaluations: failed,
            skipped_evaluations: skipped,
            stop,
        }
    }

    /// Run up to `max_iterations` generations in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the config was made invalid
    /// through [`config_mut`](Self::config_mut).
    pub fn run<F>(
        &mut self,
        fitness: &F,
        callback: Option<&mut dyn SuccessCallback<S>>,
    ) -> Result<(Termination, usize)>
    where
        F: FitnessFn<S> + ?Sized,
    {
        self.drive(fitness, callback, None)
    }

    /// Like [`run`](Self::run), but also stops as soon as `stop_when`
    /// returns `true` for a generation's best fitness. The predicate is
    /// checked every generation, whether or not the target was met.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub fn run_until<F>(
        &mut self,
        fitness: &F,
        callback: Option<&mut dyn SuccessCallback<S>>,
        stop_when: &mut dyn FnMut(f64) -> bool,
    ) -> Result<(Termination, usize)>
    where
        F: FitnessFn<S> + ?Sized,
    {
        self.drive(fitness, callback, Some(stop_when))
    }

    fn drive<F>(
        &mut self,
        fitness: &F,
        mut callback: Option<&mut dyn SuccessCallback<S>>,
        mut stop_when: Option<&mut dyn FnMut(f64) -> bool>,
    ) -> Result<(Termination, usize)>
    where
        F: FitnessFn<S> + ?Sized,
    {
        self.config.validate()?;
        if self.population.len() != self.config.population_size {
            return Err(Error::InvalidConfig(
                "population_size cannot change after construction".into(),
            ));
        }
        info!(
            population = self.config.population_size,
            max_iterations = self.config.max_iterations,
            ranking = ?self.config.ranking,
            target = self.config.target_value,
            "training started"
        );
        for completed in 1..=self.config.max_iterations {
            let reborrowed = match callback {
                Some(ref mut c) => Some(&mut **c as &mut dyn SuccessCallback<S>),
                None => None,
            };
            let report = self.step(fitness, reborrowed);
            if report.stop {
                info!(
                    generation = report.generation,
                    best_fitness = report.best_fitness,
                    "training stopped by success callback"
                );
                return Ok((Termination::SuccessStop, completed));
            }
            if let Some(stop) = stop_when.as_deref_mut() {
                if stop(report.best_fitness) {
                    info!(
                        generation = report.generation,
                        best_fitness = report.best_fitness,
                        "training stopped by stop condition"
                    );
                    return Ok((Termination::StopCondition, completed));
                }
            }
        }
        info!(
            generations = self.config.max_iterations,
            best_fitness = self.population.best().map(|a| a.fitness),
            "generation budget exhausted"
        );
        Ok((Termination::BudgetExhausted, self.config.max_iterations))
    }

    /// Train without a success callback until the budget runs out.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub fn train<F>(mut self, fitness: F) -> Result<TrainingOutcome<S>>
    where
        F: FitnessFn<S>,
    {
        let (termination, generations) = self.run(&fitness, None)?;
        self.finish(termination, generations)
    }

    /// Train until the budget runs out or `stop_when` accepts a
    /// generation's best fitness.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub fn train_until<F, P>(mut self, fitness: F, mut stop_when: P) -> Result<TrainingOutcome<S>>
    where
        F: FitnessFn<S>,
        P: FnMut(f64) -> bool,
    {
        let (termination, generations) = self.run_until(&fitness, None, &mut stop_when)?;
        self.finish(termination, generations)
    }

    /// Train, consulting `callback` whenever the best agent meets the target.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub fn train_with_callback<F, C>(
        mut self,
        fitness: F,
        mut callback: C,
    ) -> Result<TrainingOutcome<S>>
    where
        F: FitnessFn<S>,
        C: SuccessCallback<S>,
    {
        let (termination, generations) = self.run(&fitness, Some(&mut callback))?;
        self.finish(termination, generations)
    }

    fn finish(
        mut self,
        termination: Termination,
        generations: usize,
    ) -> Result<TrainingOutcome<S>> {
        let best = self
            .population
            .take()
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidConfig("population is empty".into()))?;
        Ok(TrainingOutcome {
            best,
            state: self.state,
            termination,
            generations,
        })
    }

    /// Score every agent against the current state. Returns the number of
    /// failed and skipped evaluations.
    fn evaluate<F>(&mut self, fitness: &F) -> (usize, usize)
    where
        F: FitnessFn<S> + ?Sized,
    {
        let sentinel = self.config.ranking.sentinel();
        let deadline = self.config.generation_timeout.map(|t| Instant::now() + t);
        let state = &self.state;

        let outcomes: Vec<Evaluation> = self
            .population
            .agents_mut()
            .par_iter_mut()
            .map(|agent| {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    agent.fitness = sentinel;
                    return Evaluation::Skipped;
                }
                match catch_unwind(AssertUnwindSafe(|| fitness.evaluate(&agent.genome, state))) {
                    Ok(score) if !score.is_nan() => {
                        agent.fitness = score;
                        Evaluation::Scored
                    }
                    _ => {
                        agent.fitness = sentinel;
                        Evaluation::Failed
                    }
                }
            })
            .collect();

        let failed = outcomes
            .iter()
            .filter(|o| matches!(o, Evaluation::Failed))
            .count();
        let skipped = outcomes
            .iter()
            .filter(|o| matches!(o, Evaluation::Skipped))
            .count();
        if failed > 0 {
            warn!(failed, "fitness evaluation panicked or returned NaN");
        }
        if skipped > 0 {
            warn!(skipped, "generation deadline passed before evaluation");
        }
        (failed, skipped)
    }

    /// Refill slots `elite..size` with mutated clones of the elite.
    fn breed(&mut self) {
        let intensity = self.config.mutation_intensity;
        let rates = &self.config.mutation_rates;
        let rng = &mut self.rng;

        let mut agents = self.population.take();
        let elite = (agents.len() / 3).max(1);
        for i in elite..agents.len() {
            let mut genome = agents[i % elite].genome.clone();
            genome.mutate_with(intensity, rates, rng);
            agents[i] = Agent::new(genome);
        }
        self.population.replace(agents);
    }
}

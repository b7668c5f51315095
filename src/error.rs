//! Error types shared across the crate.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong when building, evaluating, persisting or
/// evolving genomes.
///
/// Mutation operators never produce errors: a rejected or impossible
/// mutation is a silent no-op.
#[derive(Debug, Error)]
pub enum Error {
    /// A genome needs at least one input and one output neuron, and the
    /// neuron count must fit in `usize`.
    #[error("invalid genome dimensions: {inputs} inputs and {outputs} outputs")]
    InvalidDimensions {
        /// Requested number of inputs.
        inputs: usize,
        /// Requested number of outputs.
        outputs: usize,
    },

    /// The input vector passed to a forward evaluation has the wrong length.
    #[error("expected {expected} inputs, got {actual}")]
    DimensionMismatch {
        /// Number of input neurons in the genome.
        expected: usize,
        /// Length of the provided input vector.
        actual: usize,
    },

    /// The simulation configuration violates one of its preconditions.
    #[error("invalid simulation config: {0}")]
    InvalidConfig(String),

    /// Persisted genome data is malformed.
    ///
    /// `line` is 1-based for the text format and 0 when the problem is not
    /// tied to a particular line.
    #[error("malformed genome data (line {line}): {reason}")]
    Codec {
        /// Offending line, or 0.
        line: usize,
        /// Human readable description.
        reason: String,
    },

    /// An activation name that is not part of the catalog.
    #[error("unknown activation function `{0}`")]
    UnknownActivation(String),

    /// JSON (de)serialization failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// I/O failure while saving or loading a genome.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn codec(line: usize, reason: impl Into<String>) -> Self {
        Self::Codec {
            line,
            reason: reason.into(),
        }
    }
}

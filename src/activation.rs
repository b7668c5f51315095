//! Activation functions applied to every non-input neuron of a genome.
//!
//! An [`Activation`] is a plain `Copy` value: pure, stateless and shared by
//! every neuron of a genome and by all of its clones. The name returned by
//! [`Activation::name`] is what the codec persists, and [`FromStr`] resolves
//! it back.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Scalar activation functions supported by genomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Activation {
    /// Identity function: f(x) = x
    Identity,
    /// Sigmoid: f(x) = 1 / (1 + e^(-x))
    Sigmoid,
    /// Hyperbolic tangent: f(x) = tanh(x)
    Tanh,
    /// Rectified Linear Unit: f(x) = max(0, x)
    #[default]
    ReLU,
    /// Leaky ReLU: `f(x) = x` if `x > 0` else `0.01x`
    LeakyReLU,
    /// Sine function: f(x) = sin(x)
    Sine,
    /// Cosine function: f(x) = cos(x)
    Cosine,
    /// Gaussian: f(x) = e^(-x^2)
    Gaussian,
    /// Absolute value: f(x) = |x|
    Abs,
    /// Step function: f(x) = 1 if x > 0 else 0
    Step,
}

impl Activation {
    /// All available activation functions.
    pub const ALL: [Self; 10] = [
        Self::Identity,
        Self::Sigmoid,
        Self::Tanh,
        Self::ReLU,
        Self::LeakyReLU,
        Self::Sine,
        Self::Cosine,
        Self::Gaussian,
        Self::Abs,
        Self::Step,
    ];

    /// Apply this activation function to an input value.
    ///
    /// NaN propagates through every function. Infinite inputs map to the
    /// function's limit where one exists.
    #[inline]
    #[must_use]
    pub fn apply(self, x: f64) -> f64 {
        if x.is_nan() {
            return f64::NAN;
        }

        match self {
            Self::Identity => x,
            Self::Sigmoid => {
                if x == f64::INFINITY {
                    return 1.0;
                }
                if x == f64::NEG_INFINITY {
                    return 0.0;
                }
                // exp overflows past ~709
                let clamped = x.clamp(-700.0, 700.0);
                1.0 / (1.0 + (-clamped).exp())
            }
            Self::Tanh => x.tanh(),
            Self::ReLU => x.max(0.0),
            Self::LeakyReLU => {
                if x > 0.0 {
                    x
                } else {
                    0.01 * x
                }
            }
            Self::Sine => {
                if x.is_infinite() {
                    return 0.0;
                }
                x.sin()
            }
            Self::Cosine => {
                if x.is_infinite() {
                    return 0.0;
                }
                x.cos()
            }
            Self::Gaussian => {
                if x.abs() > 40.0 {
                    0.0
                } else {
                    (-x * x).exp()
                }
            }
            Self::Abs => x.abs(),
            Self::Step => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Stable identifier used by the genome codec.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Identity => "Identity",
            Self::Sigmoid => "Sigmoid",
            Self::Tanh => "Tanh",
            Self::ReLU => "ReLU",
            Self::LeakyReLU => "LeakyReLU",
            Self::Sine => "Sine",
            Self::Cosine => "Cosine",
            Self::Gaussian => "Gaussian",
            Self::Abs => "Abs",
            Self::Step => "Step",
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Activation {
    type Err = Error;

    /// Names are matched case-insensitively, so `"Relu"` and `"LeakyRelu"`
    /// resolve as well.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|activation| activation.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| Error::UnknownActivation(trimmed.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        assert!((Activation::Identity.apply(0.5) - 0.5).abs() < 1e-12);
        assert!((Activation::Identity.apply(-2.0) - -2.0).abs() < 1e-12);
    }

    #[test]
    fn test_sigmoid() {
        assert!((Activation::Sigmoid.apply(0.0) - 0.5).abs() < 1e-12);
        assert!(Activation::Sigmoid.apply(10.0) > 0.99);
        assert!(Activation::Sigmoid.apply(-10.0) < 0.01);
        assert_eq!(Activation::Sigmoid.apply(f64::INFINITY), 1.0);
        assert!(Activation::Sigmoid.apply(-1e6).is_finite());
    }

    #[test]
    fn test_tanh() {
        assert!(Activation::Tanh.apply(0.0).abs() < 1e-12);
        assert!(Activation::Tanh.apply(10.0) > 0.99);
        assert!(Activation::Tanh.apply(-10.0) < -0.99);
    }

    #[test]
    fn test_relu_and_leaky() {
        assert_eq!(Activation::ReLU.apply(4.0), 4.0);
        assert_eq!(Activation::ReLU.apply(-0.5), 0.0);
        assert_eq!(Activation::LeakyReLU.apply(1.0), 1.0);
        assert!((Activation::LeakyReLU.apply(-1.0) - -0.01).abs() < 1e-12);
    }

    #[test]
    fn test_periodic_and_symmetric() {
        use std::f64::consts::PI;
        assert!(Activation::Sine.apply(0.0).abs() < 1e-12);
        assert!((Activation::Cosine.apply(0.0) - 1.0).abs() < 1e-12);
        assert!(Activation::Cosine.apply(PI / 2.0).abs() < 1e-12);
        assert!((Activation::Gaussian.apply(0.0) - 1.0).abs() < 1e-12);
        assert_eq!(Activation::Abs.apply(-0.5), 0.5);
        assert_eq!(Activation::Step.apply(0.1), 1.0);
        assert_eq!(Activation::Step.apply(-0.1), 0.0);
    }

    #[test]
    fn test_nan_propagates() {
        for activation in Activation::ALL {
            assert!(activation.apply(f64::NAN).is_nan(), "{activation}");
        }
    }

    #[test]
    fn test_name_roundtrip() {
        for activation in Activation::ALL {
            assert_eq!(activation.name().parse::<Activation>().unwrap(), activation);
        }
        assert_eq!("Relu".parse::<Activation>().unwrap(), Activation::ReLU);
        assert_eq!("LeakyRelu".parse::<Activation>().unwrap(), Activation::LeakyReLU);
        assert!(matches!(
            "Swish".parse::<Activation>(),
            Err(Error::UnknownActivation(name)) if name == "Swish"
        ));
    }

    #[test]
    fn test_default_is_relu() {
        assert_eq!(Activation::default(), Activation::ReLU);
    }
}

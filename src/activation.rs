//! Activation functions for NEAT networks.

use serde::{Deserialize, Serialize};

/// Activation function applied to a node's weighted input sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Activation {
    /// Identity function: f(x) = x
    #[default]
    Identity,
    /// Steepened sigmoid: f(x) = 1 / (1 + e^(-4.9x))
    Sigmoid,
    /// Hyperbolic tangent: f(x) = tanh(x)
    Tanh,
    /// Rectified Linear Unit: f(x) = max(0, x)
    ReLU,
}

impl Activation {
    /// Activation functions available to hidden nodes.
    pub const HIDDEN: [Self; 3] = [Self::Sigmoid, Self::Tanh, Self::ReLU];

    /// Apply this activation function to an input value.
    ///
    /// NaN propagates; infinities map to the function's limits.
    #[inline]
    #[must_use]
    pub fn apply(self, x: f64) -> f64 {
        if x.is_nan() {
            return f64::NAN;
        }

        match self {
            Self::Identity => x,
            Self::Sigmoid => {
                // Clamp to avoid overflow in exp
                let clamped = (4.9 * x).clamp(-700.0, 700.0);
                1.0 / (1.0 + (-clamped).exp())
            }
            Self::Tanh => x.tanh(),
            Self::ReLU => x.max(0.0),
        }
    }
}

/// Numerically stable softmax. Returns an empty vector for empty input.
#[must_use]
pub fn softmax(values: &[f64]) -> Vec<f64> {
    let max = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        // No finite logits: fall back to uniform
        let uniform = 1.0 / values.len().max(1) as f64;
        return vec![uniform; values.len()];
    }
    let exps: Vec<f64> = values
        .iter()
        .map(|v| if v.is_finite() { (v - max).exp() } else { 0.0 })
        .collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

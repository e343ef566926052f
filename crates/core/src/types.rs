//! Domain types with enforced invariants.
//!
//! - Policy: probability distribution summing to 1.0
//! - Value: game value in range [-1, 1]

use crate::{ArborError, Result};

/// Tolerance for policy sum validation.
const POLICY_SUM_TOLERANCE: f32 = 1e-5;

/// A probability distribution over actions.
///
/// Invariant: All values are non-negative and sum to 1.0 (±1e-5).
///
/// # Example
/// ```
/// use arbor_core::Policy;
///
/// let policy = Policy::new(vec![0.3, 0.5, 0.2]).unwrap();
/// assert!((policy.sum() - 1.0).abs() < 1e-5);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Policy(Vec<f32>);

impl Policy {
    /// Create a new policy from a probability distribution.
    ///
    /// # Errors
    /// Returns `ArborError::InvalidPolicy` if the vector is empty, holds a
    /// negative or non-finite entry, or does not sum to 1.0 (±1e-5).
    pub fn new(probs: Vec<f32>) -> Result<Self> {
        check_entries(&probs)?;

        let sum: f32 = probs.iter().sum();
        if (sum - 1.0).abs() > POLICY_SUM_TOLERANCE {
            return Err(ArborError::InvalidPolicy(format!(
                "policy sum {} is not 1.0 (tolerance {})",
                sum, POLICY_SUM_TOLERANCE
            )));
        }

        Ok(Self(probs))
    }

    /// Create a policy from raw weights, normalizing them to sum to 1.0.
    ///
    /// # Errors
    /// Returns error if any weight is negative or all weights are zero.
    pub fn from_unnormalized(weights: Vec<f32>) -> Result<Self> {
        check_entries(&weights)?;

        let sum: f32 = weights.iter().sum();
        if sum <= 0.0 {
            return Err(ArborError::InvalidPolicy(
                "cannot normalize: all values are zero".to_string(),
            ));
        }

        Ok(Self(weights.iter().map(|&w| w / sum).collect()))
    }

    /// Create a uniform policy over the given number of actions.
    ///
    /// # Errors
    /// Returns error if num_actions is zero.
    pub fn uniform(num_actions: usize) -> Result<Self> {
        if num_actions == 0 {
            return Err(ArborError::InvalidPolicy(
                "cannot create uniform policy with 0 actions".to_string(),
            ));
        }

        let prob = 1.0 / num_actions as f32;
        Ok(Self(vec![prob; num_actions]))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the sum of all probabilities (should be ~1.0).
    pub fn sum(&self) -> f32 {
        self.0.iter().sum()
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

fn check_entries(values: &[f32]) -> Result<()> {
    if values.is_empty() {
        return Err(ArborError::InvalidPolicy(
            "policy cannot be empty".to_string(),
        ));
    }
    if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(ArborError::InvalidPolicy(
            "policy contains negative or non-finite values".to_string(),
        ));
    }
    Ok(())
}

impl std::ops::Index<usize> for Policy {
    type Output = f32;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

/// A game value estimate.
///
/// Invariant: Value is in range [-1, 1] where:
/// - +1 means the perspective player is winning
/// - -1 means the perspective player is losing
/// - 0 means a draw or equal position
///
/// # Example
/// ```
/// use arbor_core::Value;
///
/// let value = Value::new(0.5).unwrap();
/// assert_eq!(value.negate().get(), -0.5);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Value(f32);

impl Value {
    /// Create a new value.
    ///
    /// # Errors
    /// Returns `ArborError::InvalidValue` if the value is outside [-1, 1]
    /// or not a number.
    pub fn new(value: f32) -> Result<Self> {
        if !(-1.0..=1.0).contains(&value) {
            return Err(ArborError::InvalidValue(format!(
                "value {} is outside range [-1, 1]",
                value
            )));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> f32 {
        self.0
    }

    /// Negate the value (for the opponent's perspective).
    pub fn negate(self) -> Self {
        Self(-self.0)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

impl From<Value> for f32 {
    fn from(v: Value) -> f32 {
        v.0
    }
}

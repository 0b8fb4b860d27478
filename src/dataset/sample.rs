use std::collections::HashSet;

use crate::Param;

/// A single training example of the linear model.
///
/// The features are sparse: only the `(index, value)` pairs present in the example are
/// stored, in the order they were given. `score` holds the model's current prediction and
/// is written by the forward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub label: Param,
    pub score: Param,
    features: Vec<(usize, Param)>,
    unique_features: bool,
}

impl Sample {
    /// Creates a new `Sample` with a neutral score of `0.5`.
    ///
    /// # Arguments
    /// * `label` - The target, either `0` or `1` (or a probability in between).
    /// * `features` - The sparse feature list, repetitions are allowed.
    pub fn new(label: Param, features: Vec<(usize, Param)>) -> Self {
        let mut seen = HashSet::with_capacity(features.len());
        let unique_features = features.iter().all(|&(idx, _)| seen.insert(idx));

        Self {
            label,
            score: 0.5,
            features,
            unique_features,
        }
    }

    /// Sets the current prediction.
    pub fn with_score(mut self, score: Param) -> Self {
        self.score = score;
        self
    }

    pub fn features(&self) -> &[(usize, Param)] {
        &self.features
    }

    /// Whether every feature index appears at most once in this sample.
    pub fn has_unique_features(&self) -> bool {
        self.unique_features
    }

    /// The residual `label - score` driving the log-loss gradient.
    #[inline]
    pub fn residual(&self) -> Param {
        self.label - self.score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_indices_are_detected() {
        let sample = Sample::new(1., vec![(0, 1.), (3, 2.), (0, 1.)]);
        assert!(!sample.has_unique_features());

        let sample = Sample::new(1., vec![(0, 1.), (3, 2.)]);
        assert!(sample.has_unique_features());
    }

    #[test]
    fn residual_uses_current_score() {
        let sample = Sample::new(1., vec![]).with_score(0.25);
        assert_eq!(sample.residual(), 0.75);
    }
}

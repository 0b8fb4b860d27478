use std::{fs, num::NonZeroUsize, path::Path};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::{LrErr, Param, Result};

/// Stability term added to the Adam denominator when none is configured.
pub const DEFAULT_DELTA: Param = 1e-8;

fn default_delta() -> Param {
    DEFAULT_DELTA
}

fn default_shuffle() -> bool {
    true
}

/// Hyperparameters of the regularized log-loss objective and its Adam optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hyperparams {
    /// Base learning rate. Never mutated during training.
    pub alpha: Param,
    /// Decay rate of the first moment.
    pub beta_1: Param,
    /// Decay rate of the second moment.
    pub beta_2: Param,
    /// L2 regularization strength.
    pub lambda: Param,
    #[serde(default = "default_delta")]
    pub delta: Param,
}

impl Hyperparams {
    /// Creates a new set of hyperparameters with the default `delta`.
    ///
    /// # Arguments
    /// * `alpha` - The base learning rate.
    /// * `beta_1`, `beta_2` - The moment decay rates, both in `(0, 1)`.
    /// * `lambda` - The L2 regularization strength.
    pub fn new(alpha: Param, beta_1: Param, beta_2: Param, lambda: Param) -> Self {
        Self {
            alpha,
            beta_1,
            beta_2,
            lambda,
            delta: DEFAULT_DELTA,
        }
    }

    /// Replaces the stability term.
    pub fn with_delta(mut self, delta: Param) -> Self {
        self.delta = delta;
        self
    }

    /// Checks that every value lies in its admissible range.
    ///
    /// # Returns
    /// An `InvalidConfig` error naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let Self {
            alpha,
            beta_1,
            beta_2,
            lambda,
            delta,
        } = *self;

        if !(alpha > 0.) {
            return Err(LrErr::InvalidConfig(format!(
                "alpha must be positive, got {alpha}"
            )));
        }

        for (name, beta) in [("beta_1", beta_1), ("beta_2", beta_2)] {
            if !(beta > 0. && beta < 1.) {
                return Err(LrErr::InvalidConfig(format!(
                    "{name} must lie in (0, 1), got {beta}"
                )));
            }
        }

        if !(lambda >= 0.) {
            return Err(LrErr::InvalidConfig(format!(
                "lambda must be non negative, got {lambda}"
            )));
        }

        if !(delta >= 0.) {
            return Err(LrErr::InvalidConfig(format!(
                "delta must be non negative, got {delta}"
            )));
        }

        if delta == 0. {
            warn!("delta is 0, a zero second moment will divide by zero");
        }

        Ok(())
    }
}

/// Everything the training driver needs to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub hyperparams: Hyperparams,
    pub batch_size: NonZeroUsize,
    pub epochs: NonZeroUsize,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_shuffle")]
    pub shuffle: bool,
    /// Accumulate gradients over chunks of the batch in parallel.
    #[serde(default)]
    pub parallel: bool,
}

impl TrainingConfig {
    /// Parses and validates a configuration from a JSON string.
    pub fn from_json(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.hyperparams.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        Self::from_json(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_filled_in() {
        let json = r#"{
            "hyperparams": { "alpha": 0.01, "beta_1": 0.9, "beta_2": 0.999, "lambda": 0.1 },
            "batch_size": 16,
            "epochs": 3
        }"#;

        let config = TrainingConfig::from_json(json).unwrap();

        assert_eq!(config.hyperparams.delta, DEFAULT_DELTA);
        assert_eq!(config.batch_size.get(), 16);
        assert_eq!(config.epochs.get(), 3);
        assert!(config.shuffle);
        assert!(!config.parallel);
        assert!(config.seed.is_none());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let json = r#"{
            "hyperparams": { "alpha": 0.01, "beta_1": 0.9, "beta_2": 0.999, "lambda": 0.0 },
            "batch_size": 0,
            "epochs": 1
        }"#;

        assert!(matches!(
            TrainingConfig::from_json(json),
            Err(LrErr::Json(_))
        ));
    }

    #[test]
    fn out_of_range_betas_are_rejected() {
        let hp = Hyperparams::new(0.01, 1.0, 0.999, 0.);
        assert!(matches!(hp.validate(), Err(LrErr::InvalidConfig(_))));

        let hp = Hyperparams::new(0.01, 0.9, 0., 0.);
        assert!(matches!(hp.validate(), Err(LrErr::InvalidConfig(_))));
    }

    #[test]
    fn negative_lambda_and_alpha_are_rejected() {
        assert!(Hyperparams::new(0.01, 0.9, 0.999, -1.).validate().is_err());
        assert!(Hyperparams::new(0., 0.9, 0.999, 0.).validate().is_err());
        assert!(Hyperparams::new(Param::NAN, 0.9, 0.999, 0.).validate().is_err());
    }

    #[test]
    fn zero_delta_is_accepted() {
        let hp = Hyperparams::new(0.01, 0.9, 0.999, 0.).with_delta(0.);
        assert!(hp.validate().is_ok());
    }
}

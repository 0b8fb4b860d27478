//! Sparse logistic regression trained with mini-batch Adam.
//!
//! The core is split in two: a `GradientAccumulator` computing the negative gradient of the
//! L2-regularized log-loss for the indices a batch touches, and an `AdamUpdater` turning that
//! gradient into a bias-corrected parameter step. `LrAdamModel` ties both to the parameter
//! vector and `Trainer` drives it over a `Dataset`.

pub mod config;
pub mod dataset;
pub mod error;
pub mod model;
pub mod optimization;
pub mod training;

pub use config::{Hyperparams, TrainingConfig};
pub use dataset::{Dataset, FeatureIndex, Sample};
pub use error::{LrErr, Result};
pub use model::{LrAdamModel, ModelSnapshot};
pub use optimization::{AdamUpdater, GradientAccumulator};
pub use training::{EpochReport, Trainer};

/// The floating point type of parameters, gradients and moments.
pub type Param = f64;

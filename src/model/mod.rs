mod params;
mod snapshot;

use log::debug;

pub use params::Parameters;
pub use snapshot::ModelSnapshot;

use crate::{
    config::Hyperparams,
    dataset::{FeatureIndex, Sample},
    optimization::{AdamUpdater, GradientAccumulator},
    LrErr, Param, Result,
};

/// Predictions are clamped to `[EPS, 1 - EPS]` before taking logarithms.
const LOSS_EPS: Param = 1e-15;

/// Binary logistic regression trained with sparse mini-batch Adam.
///
/// Each batch is one `accumulate_gradient` followed by one `apply_update`. The model is
/// not meant to be shared: two batches running against the same instance would mix their
/// gradients.
#[derive(Debug)]
pub struct LrAdamModel {
    hyperparams: Hyperparams,
    params: Parameters,
    accumulator: GradientAccumulator,
    updater: AdamUpdater,
    parallel: bool,
}

impl LrAdamModel {
    /// Creates a new zero-initialized model.
    ///
    /// # Arguments
    /// * `f_size` - The amount of parameters, the number of features plus the bias.
    /// * `hyperparams` - The optimization hyperparameters.
    ///
    /// # Panics
    /// If `f_size` is zero.
    pub fn new(f_size: usize, hyperparams: Hyperparams) -> Self {
        Self::with_theta(vec![0.; f_size], hyperparams)
    }

    fn with_theta(theta: Vec<Param>, hyperparams: Hyperparams) -> Self {
        let f_size = theta.len();

        Self {
            accumulator: GradientAccumulator::new(f_size),
            updater: AdamUpdater::new(f_size, &hyperparams),
            params: Parameters::from_theta(theta),
            hyperparams,
            parallel: false,
        }
    }

    /// Restores the parameters of a saved model. The moments start from zero again.
    pub fn from_snapshot(snapshot: ModelSnapshot, hyperparams: Hyperparams) -> Result<Self> {
        let ModelSnapshot {
            f_size,
            theta,
            features,
            ..
        } = snapshot;

        if theta.len() != f_size {
            return Err(LrErr::SizeMismatch {
                a: "theta",
                b: "f_size",
                got: theta.len(),
                expected: f_size,
            });
        }

        if features.f_size() != f_size {
            return Err(LrErr::SizeMismatch {
                a: "features",
                b: "f_size",
                got: features.f_size(),
                expected: f_size,
            });
        }

        Ok(Self::with_theta(theta, hyperparams))
    }

    /// Accumulates gradients over chunks of each batch in parallel.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn hyperparams(&self) -> &Hyperparams {
        &self.hyperparams
    }

    pub fn f_size(&self) -> usize {
        self.accumulator.f_size()
    }

    pub fn bias_index(&self) -> usize {
        self.accumulator.bias_index()
    }

    /// The current parameter vector.
    pub fn theta(&self) -> &[Param] {
        self.params.theta()
    }

    /// The number of batches applied so far.
    pub fn curr_batch(&self) -> u64 {
        self.updater.timestep()
    }

    pub fn accumulator(&self) -> &GradientAccumulator {
        &self.accumulator
    }

    pub fn updater(&self) -> &AdamUpdater {
        &self.updater
    }

    /// The probability of the positive class for `sample`.
    pub fn predict(&self, sample: &Sample) -> Param {
        let theta = self.theta();
        let bias = self.bias_index();

        let z = sample
            .features()
            .iter()
            .fold(theta[bias], |z, &(idx, value)| {
                assert!(idx < bias, "feature index {idx} out of range");
                z + theta[idx] * value
            });

        sigmoid(z)
    }

    /// Scores the samples in `[l, r)` with the current parameters.
    pub fn forward(&self, data: &mut [Sample], l: usize, r: usize) {
        for sample in &mut data[l..r] {
            sample.score = self.predict(sample);
        }
    }

    /// Accumulates the negative gradient of the batch `[l, r)` of `data`.
    ///
    /// # Panics
    /// If `l >= r`, `r` is past the end of `data` or a feature index is out of range.
    pub fn accumulate_gradient(&mut self, data: &[Sample], l: usize, r: usize) {
        assert!(l < r && r <= data.len(), "invalid batch range [{l}, {r})");

        if self.curr_batch() == 0 {
            debug!("backward: batch [{l}, {r}) of {}", data.len());
        }

        let batch = &data[l..r];
        let theta = self.params.theta();
        let lambda = self.hyperparams.lambda;

        if self.parallel {
            self.accumulator.accumulate_par(batch, theta, lambda);
        } else {
            self.accumulator.accumulate(batch, theta, lambda);
        }
    }

    /// Applies the Adam step for the last accumulated batch, commits the new parameters
    /// and zeroes the whole gradient buffer.
    pub fn apply_update(&mut self) {
        let step_size = self.updater.update(
            self.accumulator.gradient(),
            self.accumulator.touched(),
            self.params.staged_mut(),
        );

        if self.curr_batch() == 1 {
            debug!(
                "update: {} parameters touched, step size {step_size}",
                self.accumulator.touched().len()
            );
        }

        self.params.commit();
        self.accumulator.reset_all();
    }

    /// The regularized log-loss over `data`, using fresh predictions.
    ///
    /// # Returns
    /// The mean log-loss plus `lambda / 2 * ||theta||^2 / len`, `0` for empty data.
    pub fn log_loss(&self, data: &[Sample]) -> Param {
        if data.is_empty() {
            return 0.;
        }

        let n = data.len() as Param;
        let loss: Param = data
            .iter()
            .map(|sample| {
                let p = self.predict(sample).clamp(LOSS_EPS, 1. - LOSS_EPS);
                -(sample.label * p.ln() + (1. - sample.label) * (1. - p).ln())
            })
            .sum();

        let l2: Param = self.theta().iter().map(|w| w * w).sum();
        (loss + self.hyperparams.lambda / 2. * l2) / n
    }

    /// A serializable copy of the parameters, labelled with their feature keys.
    pub fn snapshot(&self, features: &FeatureIndex) -> ModelSnapshot {
        ModelSnapshot {
            f_size: self.f_size(),
            curr_batch: self.curr_batch(),
            theta: self.theta().to_vec(),
            features: features.clone(),
        }
    }
}

#[inline]
fn sigmoid(z: Param) -> Param {
    1. / (1. + (-z).exp())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn model(f_size: usize, lambda: Param) -> LrAdamModel {
        LrAdamModel::new(f_size, Hyperparams::new(0.01, 0.9, 0.999, lambda))
    }

    #[test]
    fn zero_model_predicts_one_half() {
        let model = model(3, 0.);
        let sample = Sample::new(1., vec![(0, 3.), (1, -2.)]);

        assert_eq!(model.predict(&sample), 0.5);
        assert_relative_eq!(model.log_loss(&[sample]), 2f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn forward_writes_scores_in_range_only() {
        let mut model = model(2, 0.);
        let mut data = vec![
            Sample::new(1., vec![(0, 1.)]).with_score(0.),
            Sample::new(1., vec![(0, 1.)]).with_score(0.),
        ];

        model.accumulate_gradient(&data, 0, 2);
        model.apply_update();
        model.forward(&mut data, 1, 2);

        assert_eq!(data[0].score, 0.);
        assert!(data[1].score > 0.5);
    }

    #[test]
    fn batch_counter_advances_per_update() {
        let mut model = model(2, 0.);
        let data = vec![Sample::new(1., vec![(0, 1.)])];

        for _ in 0..3 {
            model.accumulate_gradient(&data, 0, 1);
            model.apply_update();
        }

        assert_eq!(model.curr_batch(), 3);
    }

    #[test]
    #[should_panic(expected = "invalid batch range")]
    fn empty_range_panics() {
        let mut model = model(2, 0.);
        let data = vec![Sample::new(1., vec![(0, 1.)])];
        model.accumulate_gradient(&data, 1, 1);
    }

    #[test]
    fn snapshot_size_mismatch() {
        let model = model(3, 0.);
        let mut snapshot = model.snapshot(&FeatureIndex::from_keys(["a", "b"]));
        snapshot.theta.pop();

        let hp = *model.hyperparams();
        assert!(matches!(
            LrAdamModel::from_snapshot(snapshot, hp),
            Err(LrErr::SizeMismatch { a: "theta", .. })
        ));
    }
}

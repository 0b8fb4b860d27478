use log::{info, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{config::TrainingConfig, dataset::Dataset, model::LrAdamModel, Param};

/// The losses measured at the end of an epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochReport {
    pub epoch: usize,
    pub train_loss: Param,
    pub test_loss: Option<Param>,
}

/// Drives the training loop: decides batch boundaries, runs the forward pass and applies
/// one gradient step per batch.
pub struct Trainer<R: Rng> {
    config: TrainingConfig,
    rng: R,
}

impl Trainer<StdRng> {
    /// Creates a `Trainer` whose shuffling is seeded from the configuration, or from the OS
    /// when no seed is given.
    pub fn from_config(config: TrainingConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self::new(config, rng)
    }
}

impl<R: Rng> Trainer<R> {
    /// Returns a new `Trainer`.
    ///
    /// # Arguments
    /// * `config` - The hyperparameters and loop settings.
    /// * `rng` - A random number generator used for shuffling.
    pub fn new(config: TrainingConfig, rng: R) -> Self {
        Self { config, rng }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Creates a fresh model over `f_size` parameters using this trainer's hyperparameters.
    pub fn build_model(&self, f_size: usize) -> LrAdamModel {
        LrAdamModel::new(f_size, self.config.hyperparams).with_parallel(self.config.parallel)
    }

    /// Runs every configured epoch over `train`.
    ///
    /// # Arguments
    /// * `model` - The model to train.
    /// * `train` - The training set, reordered when shuffling is enabled.
    /// * `test` - An optional evaluation set, scored at the end of each epoch.
    ///
    /// # Returns
    /// One report per epoch.
    pub fn train(
        &mut self,
        model: &mut LrAdamModel,
        train: &mut Dataset,
        test: Option<&Dataset>,
    ) -> Vec<EpochReport> {
        if train.is_empty() {
            warn!("empty training set, nothing to do");
            return Vec::new();
        }

        let epochs = self.config.epochs.get();
        let mut reports = Vec::with_capacity(epochs);

        for epoch in 0..epochs {
            if self.config.shuffle {
                train.shuffle(&mut self.rng);
            }

            for batch in train.batches(self.config.batch_size) {
                let data = train.get_data_mut();
                model.forward(data, batch.start, batch.end);
                model.accumulate_gradient(data, batch.start, batch.end);
                model.apply_update();
            }

            let train_loss = model.log_loss(train.get_data());
            let test_loss = test.map(|ds| model.log_loss(ds.get_data()));

            match test_loss {
                Some(test_loss) => {
                    info!("epoch {epoch}: train loss {train_loss:.6}, test loss {test_loss:.6}")
                }
                None => info!("epoch {epoch}: train loss {train_loss:.6}"),
            }

            reports.push(EpochReport {
                epoch,
                train_loss,
                test_loss,
            });
        }

        reports
    }
}

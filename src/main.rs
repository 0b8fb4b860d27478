use std::env;

use anyhow::{bail, Context, Result};
use log::info;

use lr_adam::{Dataset, FeatureIndex, Trainer, TrainingConfig};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        bail!(
            "Usage: {} <config.json> <train.txt> [test.txt] [model_out.json]",
            args[0]
        );
    }

    let config = TrainingConfig::from_path(&args[1])
        .with_context(|| format!("failed to load config {}", args[1]))?;

    let mut features = FeatureIndex::new();
    let mut train = Dataset::load_train(&args[2], &mut features)
        .with_context(|| format!("failed to load training set {}", args[2]))?;

    let test = args
        .get(3)
        .map(|path| {
            Dataset::load_test(path, &features)
                .with_context(|| format!("failed to load test set {path}"))
        })
        .transpose()?;

    info!(
        "loaded {} training samples over {} features",
        train.len(),
        features.len()
    );

    let mut trainer = Trainer::from_config(config);
    let mut model = trainer.build_model(features.f_size());
    let reports = trainer.train(&mut model, &mut train, test.as_ref());

    if let Some(last) = reports.last() {
        info!(
            "finished after {} batches, final train loss {:.6}",
            model.curr_batch(),
            last.train_loss
        );
    }

    if let Some(path) = args.get(4) {
        model
            .snapshot(&features)
            .save_json(path)
            .with_context(|| format!("failed to save model to {path}"))?;
        info!("model saved to {path}");
    }

    Ok(())
}

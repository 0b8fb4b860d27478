mod trainer;

pub use trainer::{EpochReport, Trainer};

mod accumulator;
mod adam;

pub use accumulator::GradientAccumulator;
pub use adam::AdamUpdater;

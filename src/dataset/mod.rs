mod features;
mod parser;
mod sample;

use std::{fs, num::NonZeroUsize, ops::Range, path::Path};

use rand::{seq::SliceRandom, Rng};

pub use features::FeatureIndex;
pub use parser::{parse_test, parse_train};
pub use sample::Sample;

use crate::Result;

/// An in-memory collection of samples.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    samples: Vec<Sample>,
}

impl Dataset {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    /// Reads a training file, see `parse_train`.
    pub fn load_train<P: AsRef<Path>>(path: P, index: &mut FeatureIndex) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        parse_train(&text, index)
    }

    /// Reads an evaluation file, see `parse_test`.
    pub fn load_test<P: AsRef<Path>>(path: P, index: &FeatureIndex) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        parse_test(&text, index)
    }

    pub fn get_data(&self) -> &[Sample] {
        &self.samples
    }

    pub fn get_data_mut(&mut self) -> &mut [Sample] {
        &mut self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Shuffles the samples in place.
    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        self.samples.shuffle(rng);
    }

    /// Splits the dataset into contiguous `[l, r)` ranges of `batch_size` samples, the last
    /// one possibly shorter.
    pub fn batches(&self, batch_size: NonZeroUsize) -> impl Iterator<Item = Range<usize>> {
        let len = self.samples.len();
        let size = batch_size.get();

        (0..len).step_by(size).map(move |l| l..(l + size).min(len))
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn dataset(n: usize) -> Dataset {
        let samples = (0..n)
            .map(|i| Sample::new((i % 2) as f64, vec![(i, 1.)]))
            .collect();

        Dataset::new(samples)
    }

    #[test]
    fn batches_cover_everything() {
        let ds = dataset(7);
        let batches: Vec<_> = ds.batches(NonZeroUsize::new(3).unwrap()).collect();

        assert_eq!(batches, vec![0..3, 3..6, 6..7]);
    }

    #[test]
    fn batches_of_empty_dataset() {
        let ds = dataset(0);
        assert_eq!(ds.batches(NonZeroUsize::new(3).unwrap()).count(), 0);
    }

    #[test]
    fn seeded_shuffle_is_a_permutation() {
        let mut ds = dataset(20);
        ds.shuffle(&mut StdRng::seed_from_u64(42));

        let mut idxs: Vec<_> = ds.get_data().iter().map(|s| s.features()[0].0).collect();
        idxs.sort_unstable();

        assert_eq!(idxs, (0..20).collect::<Vec<_>>());
    }
}

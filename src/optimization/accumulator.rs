use std::collections::{hash_map::Entry, HashMap, HashSet};

use rayon::prelude::*;

use crate::{dataset::Sample, Param};

/// Smallest amount of samples handed to a single rayon task.
const MIN_CHUNK: usize = 64;

/// Accumulates the negative gradient of the L2-regularized log-loss over a batch.
///
/// For a batch of `n` samples, every `(idx, value)` occurrence adds
/// `(label - score) * value / n` to `idx`, every sample adds `(label - score) / n` to the
/// bias and every touched index receives `-lambda / n * theta[idx]` exactly once. The indices
/// that received the L2 term are recorded in first-touched order, the bias last.
///
/// The buffer is dense and sized to the whole parameter vector. Entries outside
/// `touched()` are whatever the last reset left there and must not be read.
#[derive(Debug)]
pub struct GradientAccumulator {
    grad: Box<[Param]>,
    touched: Vec<usize>,
    seen: HashSet<usize>,
}

impl GradientAccumulator {
    /// Creates a new zeroed `GradientAccumulator`.
    ///
    /// # Arguments
    /// * `f_size` - The amount of parameters, the bias being the last one.
    ///
    /// # Panics
    /// If `f_size` is zero, there would be no slot for the bias.
    pub fn new(f_size: usize) -> Self {
        assert!(f_size > 0, "the parameter vector needs at least the bias slot");

        Self {
            grad: vec![0.; f_size].into_boxed_slice(),
            touched: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn f_size(&self) -> usize {
        self.grad.len()
    }

    pub fn bias_index(&self) -> usize {
        self.grad.len() - 1
    }

    /// The dense gradient buffer, only meaningful at the indices in `touched()`.
    pub fn gradient(&self) -> &[Param] {
        &self.grad
    }

    /// The indices touched by the last accumulated batch, without duplicates and ending
    /// with the bias.
    pub fn touched(&self) -> &[usize] {
        &self.touched
    }

    /// Accumulates the gradient of `samples`, taking the online path for a single sample
    /// without repeated features.
    ///
    /// # Arguments
    /// * `samples` - The batch, `n = samples.len()`.
    /// * `theta` - The current parameters, read by the L2 term.
    /// * `lambda` - The L2 regularization strength.
    ///
    /// # Panics
    /// If the batch is empty or a feature index doesn't lie in `[0, f_size - 1)`.
    pub fn accumulate(&mut self, samples: &[Sample], theta: &[Param], lambda: Param) {
        match samples {
            [sample] if sample.has_unique_features() => {
                self.accumulate_online(sample, theta, lambda)
            }
            _ => self.accumulate_batch(samples, theta, lambda),
        }
    }

    /// Online (`n == 1`) accumulation. Every occurrence is the first one, so the L2 term
    /// is added without consulting the dedup set.
    ///
    /// # Panics
    /// If `sample` repeats a feature index, use `accumulate_batch` for those.
    pub fn accumulate_online(&mut self, sample: &Sample, theta: &[Param], lambda: Param) {
        assert!(
            sample.has_unique_features(),
            "the online path requires distinct feature indices"
        );
        self.begin(theta);

        let n: Param = 1.;
        let factor = -lambda / n;
        let bias = self.bias_index();
        let residual = sample.residual();

        for &(idx, value) in sample.features() {
            check_feature(idx, bias);
            self.grad[idx] += residual * value / n;
            self.grad[idx] += factor * theta[idx];
            self.touched.push(idx);
        }

        self.grad[bias] += residual / n;
        self.finish(theta, factor);
    }

    /// General mini-batch accumulation with a batch-scoped dedup set for the L2 term.
    pub fn accumulate_batch(&mut self, samples: &[Sample], theta: &[Param], lambda: Param) {
        assert!(!samples.is_empty(), "cannot accumulate an empty batch");
        self.begin(theta);

        let n = samples.len() as Param;
        let factor = -lambda / n;
        let bias = self.bias_index();

        for sample in samples {
            let residual = sample.residual();

            for &(idx, value) in sample.features() {
                check_feature(idx, bias);
                self.grad[idx] += residual * value / n;

                if self.seen.insert(idx) {
                    self.grad[idx] += factor * theta[idx];
                    self.touched.push(idx);
                }
            }

            self.grad[bias] += residual / n;
        }

        self.finish(theta, factor);
    }

    /// Mini-batch accumulation over contiguous chunks processed in parallel.
    ///
    /// Chunks are merged in order, so `touched()` is the same as for `accumulate_batch` and
    /// the L2 term still lands once per index. Gradient values only differ from the serial
    /// ones by the order of the floating point sums.
    pub fn accumulate_par(&mut self, samples: &[Sample], theta: &[Param], lambda: Param) {
        assert!(!samples.is_empty(), "cannot accumulate an empty batch");

        let n = samples.len() as Param;
        let factor = -lambda / n;
        let bias = self.bias_index();
        let chunk_size = samples
            .len()
            .div_ceil(rayon::current_num_threads())
            .max(MIN_CHUNK);

        let partials: Vec<_> = samples
            .par_chunks(chunk_size)
            .map(|chunk| PartialGrad::collect(chunk, n, bias))
            .collect();

        self.begin(theta);

        for partial in partials {
            for (idx, g) in partial.order.into_iter().zip(partial.sums) {
                self.grad[idx] += g;

                if self.seen.insert(idx) {
                    self.grad[idx] += factor * theta[idx];
                    self.touched.push(idx);
                }
            }

            self.grad[bias] += partial.bias;
        }

        self.finish(theta, factor);
    }

    /// Zeroes the given entries of the buffer.
    pub fn reset(&mut self, indices: &[usize]) {
        for &idx in indices {
            self.grad[idx] = 0.;
        }
    }

    /// Zeroes the whole buffer.
    pub fn reset_all(&mut self) {
        self.grad.fill(0.);
    }

    fn begin(&mut self, theta: &[Param]) {
        assert_eq!(
            theta.len(),
            self.grad.len(),
            "theta and the gradient buffer must have the same length"
        );

        self.touched.clear();
        self.seen.clear();
    }

    fn finish(&mut self, theta: &[Param], factor: Param) {
        let bias = self.bias_index();
        self.grad[bias] += factor * theta[bias];
        self.touched.push(bias);
    }
}

#[inline]
fn check_feature(idx: usize, bias: usize) {
    assert!(
        idx < bias,
        "feature index {idx} out of range, expected less than {bias}"
    );
}

/// Log-loss sums of one chunk, in chunk-local first-seen order.
struct PartialGrad {
    order: Vec<usize>,
    sums: Vec<Param>,
    bias: Param,
}

impl PartialGrad {
    fn collect(chunk: &[Sample], n: Param, bias: usize) -> Self {
        let mut slots = HashMap::new();
        let mut order = Vec::new();
        let mut sums = Vec::new();
        let mut bias_sum = 0.;

        for sample in chunk {
            let residual = sample.residual();

            for &(idx, value) in sample.features() {
                check_feature(idx, bias);

                let slot = match slots.entry(idx) {
                    Entry::Occupied(e) => *e.get(),
                    Entry::Vacant(e) => {
                        order.push(idx);
                        sums.push(0.);
                        *e.insert(order.len() - 1)
                    }
                };

                sums[slot] += residual * value / n;
            }

            bias_sum += residual / n;
        }

        Self {
            order,
            sums,
            bias: bias_sum,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn loss_term_once_per_occurrence() {
        let mut acc = GradientAccumulator::new(3);
        let sample = Sample::new(1., vec![(0, 1.), (0, 2.)]).with_score(0.5);

        acc.accumulate(&[sample], &[0.; 3], 0.);

        assert_eq!(acc.gradient()[0], 0.5 + 1.0);
        assert_eq!(acc.touched(), &[0, 2]);
    }

    #[test]
    fn reset_only_given_indices() {
        let mut acc = GradientAccumulator::new(3);
        let sample = Sample::new(1., vec![(0, 1.), (1, 1.)]).with_score(0.);

        acc.accumulate(&[sample], &[0.; 3], 0.);
        acc.reset(&[0]);

        assert_eq!(acc.gradient()[0], 0.);
        assert_eq!(acc.gradient()[1], 1.);

        acc.reset_all();
        assert!(acc.gradient().iter().all(|&g| g == 0.));
    }

    #[test]
    fn parallel_matches_serial() {
        let samples: Vec<_> = (0..500)
            .map(|i| {
                let features = vec![(i % 7, 1.5), ((i * 3) % 11, -0.5), (i % 2, 1.)];
                Sample::new((i % 2) as Param, features).with_score(0.3)
            })
            .collect();
        let theta: Vec<_> = (0..12).map(|i| i as Param * 0.1).collect();

        let mut serial = GradientAccumulator::new(12);
        serial.accumulate_batch(&samples, &theta, 0.2);

        let mut parallel = GradientAccumulator::new(12);
        parallel.accumulate_par(&samples, &theta, 0.2);

        assert_eq!(serial.touched(), parallel.touched());
        for &idx in serial.touched() {
            assert_relative_eq!(
                serial.gradient()[idx],
                parallel.gradient()[idx],
                epsilon = 1e-12
            );
        }
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn feature_on_bias_slot_panics() {
        let mut acc = GradientAccumulator::new(3);
        let sample = Sample::new(1., vec![(2, 1.)]);
        acc.accumulate(&[sample], &[0.; 3], 0.);
    }

    #[test]
    #[should_panic(expected = "empty batch")]
    fn empty_batch_panics() {
        let mut acc = GradientAccumulator::new(3);
        acc.accumulate(&[], &[0.; 3], 0.);
    }

    #[test]
    #[should_panic(expected = "distinct feature indices")]
    fn online_path_rejects_repeats() {
        let mut acc = GradientAccumulator::new(3);
        let sample = Sample::new(1., vec![(0, 1.), (0, 1.)]);
        acc.accumulate_online(&sample, &[0.; 3], 0.);
    }
}

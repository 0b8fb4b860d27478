use crate::{config::Hyperparams, Param};

/// Sparse Adam: keeps dense moment vectors over the whole parameter vector but only moves
/// the entries touched by the current batch.
///
/// The moments of an index that doesn't show up in a batch are left as they are, sparse
/// features keep their history between appearances.
#[derive(Debug)]
pub struct AdamUpdater {
    alpha: Param,
    beta_1: Param,
    beta_2: Param,
    delta: Param,
    beta_1_t: Param,
    beta_2_t: Param,
    t: u64,
    first_moment: Box<[Param]>,
    second_moment: Box<[Param]>,
}

impl AdamUpdater {
    /// Creates a new `AdamUpdater` with zeroed moments.
    ///
    /// # Arguments
    /// * `f_size` - The amount of parameters this instance should hold.
    /// * `hyperparams` - Learning rate, decay rates and stability term.
    ///
    /// # Returns
    /// A new `AdamUpdater` instance at timestep 0.
    pub fn new(f_size: usize, hyperparams: &Hyperparams) -> Self {
        let &Hyperparams {
            alpha,
            beta_1,
            beta_2,
            delta,
            ..
        } = hyperparams;

        Self {
            alpha,
            beta_1,
            beta_2,
            delta,
            beta_1_t: 1.,
            beta_2_t: 1.,
            t: 0,
            first_moment: vec![0.; f_size].into_boxed_slice(),
            second_moment: vec![0.; f_size].into_boxed_slice(),
        }
    }

    /// The base learning rate.
    pub fn learning_rate(&self) -> Param {
        self.alpha
    }

    /// The number of updates applied so far.
    pub fn timestep(&self) -> u64 {
        self.t
    }

    pub fn first_moment(&self) -> &[Param] {
        &self.first_moment
    }

    pub fn second_moment(&self) -> &[Param] {
        &self.second_moment
    }

    /// Advances the timestep and applies one Adam step to the `touched` entries of
    /// `theta_new`.
    ///
    /// # Arguments
    /// * `grad` - The negative gradient, read only at `touched`.
    /// * `touched` - The indices to update, without duplicates.
    /// * `theta_new` - The staged parameters, moved in the direction of `grad`.
    ///
    /// # Returns
    /// The bias-corrected step size used for this update.
    pub fn update(&mut self, grad: &[Param], touched: &[usize], theta_new: &mut [Param]) -> Param {
        assert_eq!(grad.len(), self.first_moment.len());
        assert_eq!(theta_new.len(), self.first_moment.len());

        let Self {
            beta_1: b1,
            beta_2: b2,
            delta,
            ..
        } = *self;

        self.t += 1;
        self.beta_1_t *= b1;
        self.beta_2_t *= b2;

        for &idx in touched {
            let g = grad[idx];
            self.first_moment[idx] = b1 * self.first_moment[idx] + (1. - b1) * g;
            self.second_moment[idx] = b2 * self.second_moment[idx] + (1. - b2) * g * g;
        }

        let step_size = self.alpha * (1. - self.beta_2_t).sqrt() / (1. - self.beta_1_t);

        for &idx in touched {
            let (m, v) = (self.first_moment[idx], self.second_moment[idx]);
            theta_new[idx] += step_size * m / (v.sqrt() + delta);
        }

        step_size
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn hyperparams() -> Hyperparams {
        Hyperparams::new(0.01, 0.9, 0.999, 0.)
    }

    #[test]
    fn untouched_moments_are_kept() {
        let mut adam = AdamUpdater::new(3, &hyperparams());
        let mut theta = [0.; 3];

        adam.update(&[1., 1., 1.], &[0, 1, 2], &mut theta);
        let m1 = adam.first_moment()[1];
        let v1 = adam.second_moment()[1];

        adam.update(&[1., 1., 1.], &[0, 2], &mut theta);

        assert_eq!(adam.first_moment()[1], m1);
        assert_eq!(adam.second_moment()[1], v1);
        assert_relative_eq!(adam.first_moment()[0], 0.19, epsilon = 1e-12);
    }

    #[test]
    fn learning_rate_is_not_compounded() {
        let hp = hyperparams();
        let mut adam = AdamUpdater::new(1, &hp);
        let mut theta = [0.];

        for t in 1..=50 {
            let step = adam.update(&[0.1], &[0], &mut theta);
            let expected =
                hp.alpha * (1. - hp.beta_2.powi(t)).sqrt() / (1. - hp.beta_1.powi(t));

            assert_relative_eq!(step, expected, max_relative = 1e-10);
            assert_eq!(adam.learning_rate(), hp.alpha);
        }

        assert_eq!(adam.timestep(), 50);
    }

    #[test]
    fn constant_gradient_steps_are_close_to_alpha() {
        let hp = hyperparams();
        let mut adam = AdamUpdater::new(1, &hp);
        let mut theta = [0.];

        for _ in 0..10 {
            let before = theta[0];
            adam.update(&[2.], &[0], &mut theta);
            assert_relative_eq!(theta[0] - before, hp.alpha, max_relative = 1e-4);
        }
    }
}

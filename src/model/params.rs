use crate::Param;

/// The live parameter vector together with its staged copy.
///
/// Updates accumulate into the staged copy, `commit` then replaces the live vector
/// wholesale. Both always start equal, so untouched entries survive the commit.
#[derive(Debug, Clone)]
pub struct Parameters {
    theta: Box<[Param]>,
    theta_new: Box<[Param]>,
}

impl Parameters {
    /// Zero-initialized parameters.
    pub fn zeros(f_size: usize) -> Self {
        Self::from_theta(vec![0.; f_size])
    }

    pub fn from_theta(theta: Vec<Param>) -> Self {
        let theta = theta.into_boxed_slice();

        Self {
            theta_new: theta.clone(),
            theta,
        }
    }

    pub fn theta(&self) -> &[Param] {
        &self.theta
    }

    pub fn staged_mut(&mut self) -> &mut [Param] {
        &mut self.theta_new
    }

    /// Copies the staged parameters over the live ones.
    pub fn commit(&mut self) {
        self.theta.copy_from_slice(&self.theta_new);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_copies_staged() {
        let mut params = Parameters::from_theta(vec![1., 2., 3.]);

        params.staged_mut()[1] += 1.;
        assert_eq!(params.theta(), &[1., 2., 3.]);

        params.commit();
        assert_eq!(params.theta(), &[1., 3., 3.]);
    }
}

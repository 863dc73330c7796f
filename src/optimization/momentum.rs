use super::{Optimizer, optimizer::check_sizes};
use crate::Result;

/// Gradient descent with heavy-ball momentum over a single parameter group.
///
/// The velocity has one entry per parameter of the group the instance was built for.
#[derive(Debug, Clone)]
pub struct GradientDescentWithMomentum {
    learning_rate: f32,
    momentum: f32,
    velocity: Box<[f32]>,
}

impl GradientDescentWithMomentum {
    /// Creates an optimizer bound to a group of `len` parameters, starting at rest.
    ///
    /// # Arguments
    /// * `len` - The length of the group's parameter and gradient slices.
    /// * `learning_rate` - The step size.
    /// * `momentum` - How much of the previous velocity is kept on each update.
    pub fn new(len: usize, learning_rate: f32, momentum: f32) -> Self {
        Self {
            learning_rate,
            momentum,
            velocity: vec![0.; len].into_boxed_slice(),
        }
    }
}

impl Optimizer for GradientDescentWithMomentum {
    /// `v = momentum * v + grad`, then `params -= learning_rate * v`.
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        check_sizes(grad, params, Some(self.velocity.len()))?;

        let (lr, mu) = (self.learning_rate, self.momentum);
        for ((p, &g), v) in params.iter_mut().zip(grad).zip(self.velocity.iter_mut()) {
            *v = mu * *v + g;
            *p -= lr * *v;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn velocity_accumulates() {
        let mut opt = GradientDescentWithMomentum::new(1, 1.0, 0.5);
        let mut params = [0.0];

        opt.update_params(&[1.0], &mut params).unwrap();
        opt.update_params(&[1.0], &mut params).unwrap();

        assert_eq!(params, [-2.5]);
    }

    #[test]
    fn bound_to_the_length_of_its_group() {
        let mut opt = GradientDescentWithMomentum::new(2, 0.1, 0.9);
        assert!(opt.update_params(&[1.0; 3], &mut [0.0; 3]).is_err());
        assert!(opt.update_params(&[1.0; 2], &mut [0.0; 2]).is_ok());
    }
}

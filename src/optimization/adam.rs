use super::{Optimizer, optimizer::check_sizes};
use crate::Result;

pub const DEFAULT_BETA1: f32 = 0.9;
pub const DEFAULT_BETA2: f32 = 0.999;
pub const DEFAULT_EPSILON: f32 = 1e-8;

/// Adam over a single parameter group.
///
/// The moment estimates are sized for the group the instance was built for, so an
/// encoder buffer and each decoder block keep separate statistics and separate bias
/// correction clocks.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    // beta^t of both moments, advanced once per update of this group.
    decay1: f32,
    decay2: f32,
    m: Box<[f32]>,
    v: Box<[f32]>,
}

impl Adam {
    /// Creates an `Adam` bound to a group of `len` parameters.
    ///
    /// # Arguments
    /// * `len` - The length of the group's parameter and gradient slices.
    /// * `learning_rate` - The step size.
    /// * `beta1` - Decay of the gradient mean estimate.
    /// * `beta2` - Decay of the squared gradient estimate.
    /// * `epsilon` - Added to the denominator of every step.
    pub fn new(len: usize, learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            decay1: 1.,
            decay2: 1.,
            m: vec![0.; len].into_boxed_slice(),
            v: vec![0.; len].into_boxed_slice(),
        }
    }

    /// Creates an `Adam` bound to a group of `len` parameters with the usual betas and
    /// epsilon.
    pub fn with_defaults(len: usize, learning_rate: f32) -> Self {
        Self::new(
            len,
            learning_rate,
            DEFAULT_BETA1,
            DEFAULT_BETA2,
            DEFAULT_EPSILON,
        )
    }
}

impl Optimizer for Adam {
    /// Updates the group in place.
    ///
    /// # Errors
    /// `SizeMismatch` if `grad` or `params` is not the length of the group this instance was
    /// built for.
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        check_sizes(grad, params, Some(self.m.len()))?;

        let (b1, b2, eps) = (self.beta1, self.beta2, self.epsilon);
        self.decay1 *= b1;
        self.decay2 *= b2;

        // Both bias corrections are folded into the step size.
        let step = self.learning_rate * (1. - self.decay2).sqrt() / (1. - self.decay1);

        for (((p, &g), m), v) in params
            .iter_mut()
            .zip(grad)
            .zip(self.m.iter_mut())
            .zip(self.v.iter_mut())
        {
            *m = b1 * *m + (1. - b1) * g;
            *v = b2 * *v + (1. - b2) * g * g;
            *p -= step * *m / (v.sqrt() + eps);
        }

        Ok(())
    }
}

use ndarray::{Array2, ArrayView2};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{MlErr, Result, arch::Mode};

/// Inverted dropout: in train mode each activation is zeroed with probability `rate` and the
/// survivors are scaled by `1 / (1 - rate)`. Eval mode is the identity.
#[derive(Debug, Clone)]
pub struct Dropout {
    rate: f32,
    rng: StdRng,
    mask: Option<Array2<f32>>,
}

impl Dropout {
    /// Creates a new `Dropout`.
    ///
    /// # Arguments
    /// * `rate` - The drop probability, in `[0, 1)`.
    /// * `seed` - Seed of the layer's own random number generator.
    pub fn new(rate: f32, seed: u64) -> Result<Self> {
        if !(0. ..1.).contains(&rate) {
            return Err(MlErr::InvalidInput("the dropout rate must be in [0, 1)"));
        }

        Ok(Self {
            rate,
            rng: StdRng::seed_from_u64(seed),
            mask: None,
        })
    }

    pub fn forward(&mut self, x: ArrayView2<f32>, mode: Mode) -> Array2<f32> {
        if mode.is_eval() {
            self.mask = None;
            return x.to_owned();
        }

        let keep = 1. / (1. - self.rate);
        let rate = self.rate;
        let rng = &mut self.rng;
        let mask = Array2::from_shape_simple_fn(x.dim(), || {
            if rng.random::<f32>() < rate { 0. } else { keep }
        });

        let a = &x * &mask;
        self.mask = Some(mask);
        a
    }

    pub fn backward(&mut self, d: ArrayView2<f32>) -> Result<Array2<f32>> {
        let mask = self
            .mask
            .take()
            .ok_or(MlErr::MissingForwardCache { layer: "dropout" })?;

        Ok(&d * &mask)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn eval_is_the_identity() {
        let mut dropout = Dropout::new(0.5, 0).unwrap();
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        assert_eq!(dropout.forward(x.view(), Mode::Eval), x);
    }

    #[test]
    fn survivors_are_rescaled_and_gradient_follows_the_mask() {
        let mut dropout = Dropout::new(0.5, 11).unwrap();
        let x = Array2::ones((8, 16));

        let a = dropout.forward(x.view(), Mode::Train);
        assert!(a.iter().all(|&v| v == 0. || v == 2.));

        let d = dropout.backward(x.view()).unwrap();
        assert_eq!(d, a);
    }

    #[test]
    fn rate_must_be_below_one() {
        assert!(Dropout::new(1.0, 0).is_err());
        assert!(Dropout::new(-0.1, 0).is_err());
    }
}

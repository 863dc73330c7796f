use ndarray::{Array2, ArrayView2};

use crate::{MlErr, Result, arch::Mode};

/// Exponential linear unit: `z` for positive inputs, `alpha * (e^z - 1)` otherwise.
#[derive(Debug, Clone)]
pub struct Elu {
    alpha: f32,
    z: Option<Array2<f32>>,
}

impl Default for Elu {
    fn default() -> Self {
        Self::new(1.)
    }
}

impl Elu {
    pub fn new(alpha: f32) -> Self {
        Self { alpha, z: None }
    }

    fn f(&self, z: f32) -> f32 {
        if z > 0. { z } else { self.alpha * z.exp_m1() }
    }

    fn df(&self, z: f32) -> f32 {
        if z > 0. { 1. } else { self.alpha * z.exp() }
    }

    pub fn forward(&mut self, z: ArrayView2<f32>, mode: Mode) -> Array2<f32> {
        let a = z.mapv(|z| self.f(z));
        self.z = mode.is_train().then(|| z.to_owned());
        a
    }

    pub fn backward(&mut self, d: ArrayView2<f32>) -> Result<Array2<f32>> {
        let z = self.z.take().ok_or(MlErr::MissingForwardCache { layer: "elu" })?;

        let mut d = d.to_owned();
        d.zip_mut_with(&z, |d, &z| *d *= self.df(z));
        Ok(d)
    }
}

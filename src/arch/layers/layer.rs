use ndarray::{Array2, ArrayView2};
use rand::Rng;

use super::{BatchNorm, Dense, Dropout, Elu};
use crate::{Result, arch::Mode};

#[derive(Debug, Clone)]
pub enum Layer {
    Dense(Dense),
    BatchNorm(BatchNorm),
    Elu(Elu),
    Dropout(Dropout),
}
use Layer::*;

impl Layer {
    pub fn dense(dim: (usize, usize)) -> Self {
        Dense(super::Dense::new(dim))
    }

    pub fn batch_norm(dim: usize) -> Self {
        BatchNorm(super::BatchNorm::new(dim))
    }

    pub fn elu() -> Self {
        Elu(super::Elu::default())
    }

    pub fn dropout(rate: f32, seed: u64) -> Result<Self> {
        super::Dropout::new(rate, seed).map(Dropout)
    }

    /// Returns the amount of trainable parameters of this layer.
    pub fn size(&self) -> usize {
        match self {
            Dense(l) => l.size(),
            BatchNorm(l) => l.size(),
            Elu(_) | Dropout(_) => 0,
        }
    }

    pub fn init<R: Rng + ?Sized>(&self, params: &mut [f32], rng: &mut R) -> Result<()> {
        match self {
            Dense(l) => l.init(params, rng),
            BatchNorm(l) => {
                l.init(params);
                Ok(())
            }
            Elu(_) | Dropout(_) => Ok(()),
        }
    }

    pub fn forward(
        &mut self,
        params: &[f32],
        x: ArrayView2<f32>,
        mode: Mode,
    ) -> Result<Array2<f32>> {
        match self {
            Dense(l) => l.forward(params, x, mode),
            BatchNorm(l) => l.forward(params, x, mode),
            Elu(l) => Ok(l.forward(x, mode)),
            Dropout(l) => Ok(l.forward(x, mode)),
        }
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: ArrayView2<f32>,
    ) -> Result<Array2<f32>> {
        match self {
            Dense(l) => l.backward(params, grad, d),
            BatchNorm(l) => l.backward(params, grad, d),
            Elu(l) => l.backward(d),
            Dropout(l) => l.backward(d),
        }
    }
}

use ndarray::prelude::*;

use crate::{MlErr, Result, arch::Mode};

const EPSILON: f32 = 1e-5;
const MOMENTUM: f32 = 0.1;

/// Per feature batch normalization with a learned scale and shift.
///
/// The parameters are the scales (`gamma`) followed by the shifts (`beta`). Running
/// statistics are layer state and are not trained.
#[derive(Debug, Clone)]
pub struct BatchNorm {
    dim: usize,
    running_mean: Array1<f32>,
    running_var: Array1<f32>,

    // Forward metadata
    cache: Option<(Array2<f32>, Array1<f32>)>,
}

impl BatchNorm {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            running_mean: Array1::zeros(dim),
            running_var: Array1::ones(dim),
            cache: None,
        }
    }

    pub fn size(&self) -> usize {
        2 * self.dim
    }

    /// Sets every scale to one and every shift to zero.
    pub fn init(&self, params: &mut [f32]) {
        let (gamma, beta) = params.split_at_mut(self.dim);
        gamma.fill(1.);
        beta.fill(0.);
    }

    pub fn forward(
        &mut self,
        params: &[f32],
        x: ArrayView2<f32>,
        mode: Mode,
    ) -> Result<Array2<f32>> {
        let (gamma, beta) = self.view_params(params)?;

        if mode.is_eval() {
            let inv_std = self.running_var.mapv(|v| (v + EPSILON).sqrt().recip());
            let x_hat = (&x - &self.running_mean) * &inv_std;
            return Ok(x_hat * &gamma + &beta);
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or(MlErr::InvalidInput("batch norm needs a non empty batch"))?;
        let var = x.var_axis(Axis(0), 0.);
        let n = x.nrows() as f32;

        let unbiased = if x.nrows() > 1 { &var * (n / (n - 1.)) } else { var.clone() };
        self.running_mean = &self.running_mean * (1. - MOMENTUM) + &mean * MOMENTUM;
        self.running_var = &self.running_var * (1. - MOMENTUM) + unbiased * MOMENTUM;

        let inv_std = var.mapv(|v| (v + EPSILON).sqrt().recip());
        let x_hat = (&x - &mean) * &inv_std;
        let y = &x_hat * &gamma + &beta;

        self.cache = Some((x_hat, inv_std));
        Ok(y)
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: ArrayView2<f32>,
    ) -> Result<Array2<f32>> {
        let (x_hat, inv_std) = self
            .cache
            .take()
            .ok_or(MlErr::MissingForwardCache { layer: "batch_norm" })?;
        let (gamma, _) = self.view_params(params)?;

        let (dgamma, dbeta) = grad.split_at_mut(self.dim);
        let mut dgamma = ArrayViewMut1::from(dgamma);
        let mut dbeta = ArrayViewMut1::from(dbeta);
        dgamma += &(&d * &x_hat).sum_axis(Axis(0));
        dbeta += &d.sum_axis(Axis(0));

        // dx = inv_std / n * (n * dx_hat - Σ dx_hat - x_hat * Σ (dx_hat * x_hat))
        let n = d.nrows() as f32;
        let dx_hat = &d * &gamma;
        let sum_dx_hat = dx_hat.sum_axis(Axis(0));
        let sum_dx_hat_x_hat = (&dx_hat * &x_hat).sum_axis(Axis(0));
        let dx = (dx_hat * n - &sum_dx_hat - x_hat * &sum_dx_hat_x_hat) * &(inv_std / n);

        Ok(dx)
    }

    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView1<'a, f32>, ArrayView1<'a, f32>)> {
        if params.len() != self.size() {
            return Err(MlErr::SizeMismatch {
                got: params.len(),
                expected: self.size(),
            });
        }

        let (gamma, beta) = params.split_at(self.dim);
        Ok((ArrayView1::from(gamma), ArrayView1::from(beta)))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn params(dim: usize) -> Vec<f32> {
        let bn = BatchNorm::new(dim);
        let mut params = vec![0.; bn.size()];
        bn.init(&mut params);
        params
    }

    #[test]
    fn train_output_is_standardized() {
        let mut bn = BatchNorm::new(2);
        let x = array![[1.0, 10.0], [3.0, 20.0], [5.0, 30.0]];

        let y = bn.forward(&params(2), x.view(), Mode::Train).unwrap();

        for col in y.axis_iter(Axis(1)) {
            assert!(col.mean().unwrap().abs() < 1e-5);
            assert!((col.var(0.) - 1.).abs() < 1e-3);
        }
    }

    #[test]
    fn running_stats_move_toward_the_batch() {
        let mut bn = BatchNorm::new(1);
        let x = array![[2.0], [4.0]];

        bn.forward(&params(1), x.view(), Mode::Train).unwrap();

        assert!((bn.running_mean[0] - 0.3).abs() < 1e-6);
        // unbiased variance of the batch is 2
        assert!((bn.running_var[0] - 1.1).abs() < 1e-6);
    }

    #[test]
    fn backward_of_a_constant_gradient_vanishes() {
        let mut bn = BatchNorm::new(1);
        let p = params(1);
        let mut grad = vec![0.; 2];
        bn.forward(&p, array![[1.0], [2.0], [4.0]].view(), Mode::Train)
            .unwrap();

        let dx = bn
            .backward(&p, &mut grad, array![[1.0], [1.0], [1.0]].view())
            .unwrap();

        assert!(dx.iter().all(|v| v.abs() < 1e-5));
        assert!((grad[1] - 3.).abs() < 1e-6);
    }
}

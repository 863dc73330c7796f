use ndarray::{Array2, ArrayView2};

use super::LossFn;

/// Sum of squared errors loss function.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sse;

impl Sse {
    /// Returns a new `Sse`.
    pub fn new() -> Self {
        Self
    }
}

impl LossFn for Sse {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        (&y_pred - &y).mapv(|x| x.powi(2)).sum()
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        (&y_pred - &y) * 2.0
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn loss_is_summed_not_averaged() {
        let y_pred = array![[1.0, 2.0], [3.0, 4.0]];
        let y = array![[0.0, 2.0], [1.0, 4.0]];

        assert_eq!(Sse.loss(y_pred.view(), y.view()), 5.0);
        assert_eq!(
            Sse.loss_prime(y_pred.view(), y.view()),
            array![[2.0, 0.0], [4.0, 0.0]]
        );
    }
}

use crate::Result;

/// Defines the strategy for updating model parameters based on calculated gradients.
///
/// An optimizer is bound to a single parameter group and may keep per parameter state for it.
pub trait Optimizer {
    /// Clears the accumulated gradient of the group before a new backward pass.
    fn zero_grad(&mut self, grad: &mut [f32]) {
        grad.fill(0.);
    }

    /// Updates the provided slice of parameters using the accumulated gradient.
    ///
    /// # Arguments
    /// * `grad` - The gradient of the group.
    /// * `params` - The parameters to update.
    ///
    /// # Returns
    /// An error if there's a mismatch in the sizes of `grad` and `params`.
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()>;
}

impl<T: Optimizer + ?Sized> Optimizer for Box<T> {
    fn zero_grad(&mut self, grad: &mut [f32]) {
        (**self).zero_grad(grad);
    }

    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        (**self).update_params(grad, params)
    }
}

pub(super) fn check_sizes(grad: &[f32], params: &[f32], state: Option<usize>) -> Result<()> {
    let expected = state.unwrap_or(params.len());
    for got in [grad.len(), params.len()] {
        if got != expected {
            return Err(crate::MlErr::SizeMismatch { got, expected });
        }
    }

    Ok(())
}

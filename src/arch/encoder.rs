use std::mem;

use log::debug;
use ndarray::{Array2, ArrayView2};
use rand::Rng;

use super::{Mode, layers::Layer};
use crate::{MlErr, Result};

/// Maps a batch of expression profiles to a batch of latent vectors.
pub trait Encoder {
    /// The input width, the amount of genes.
    fn n_in(&self) -> usize;

    /// The output width, the amount of terms.
    fn n_out(&self) -> usize;

    /// The amount of trainable parameters.
    fn n_params(&self) -> usize;

    fn set_mode(&mut self, mode: Mode);

    fn forward(&mut self, x: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Accumulates the gradient of the encoder's parameters given the loss gradient with
    /// respect to its last output.
    fn backward(&mut self, d: ArrayView2<f32>) -> Result<()>;

    /// Gives the encoder's parameters and their gradient as flat slices of the same length.
    fn param_group(&mut self) -> (&mut [f32], &mut [f32]);
}

/// A stack of layers whose parameters live in a single flat buffer.
///
/// Each layer owns the contiguous chunk of `params` that follows the previous layer's chunk,
/// and the same chunk of `grad`.
#[derive(Debug, Clone)]
pub struct FeedForwardEncoder {
    layers: Vec<Layer>,
    params: Vec<f32>,
    grad: Vec<f32>,
    dim: (usize, usize),
    mode: Mode,
}

impl FeedForwardEncoder {
    /// Creates a new `FeedForwardEncoder` and initializes its parameters.
    ///
    /// # Arguments
    /// * `layers` - The layers the encoder is composed of, input first.
    /// * `dim` - The input and output widths.
    /// * `rng` - A random number generator.
    ///
    /// # Returns
    /// A new `FeedForwardEncoder` instance or an error if a layer could not be initialized.
    pub fn new<I, R>(layers: I, dim: (usize, usize), rng: &mut R) -> Result<Self>
    where
        I: IntoIterator<Item = Layer>,
        R: Rng + ?Sized,
    {
        let layers: Vec<Layer> = layers.into_iter().collect();
        let size = layers.iter().map(Layer::size).sum();
        let mut params = vec![0.; size];

        let mut rest = params.as_mut_slice();
        for layer in &layers {
            let (chunk, tail) = mem::take(&mut rest).split_at_mut(layer.size());
            layer.init(chunk, rng)?;
            rest = tail;
        }

        debug!(params = size; "built encoder with {} layers", layers.len());

        Ok(Self {
            layers,
            grad: vec![0.; size],
            params,
            dim,
            mode: Mode::Train,
        })
    }

    /// Builds the default architecture:
    /// `Dense → BatchNorm → ELU → Dropout → Dense → BatchNorm → ELU → Dropout → Dense`.
    ///
    /// # Arguments
    /// * `n_vars` - The amount of genes.
    /// * `n_terms` - The latent width.
    /// * `mid` - The width of both hidden layers.
    /// * `dropout` - The dropout rate of both hidden layers.
    /// * `rng` - A random number generator, also used to seed the dropout layers.
    pub fn feed_forward<R: Rng + ?Sized>(
        n_vars: usize,
        n_terms: usize,
        mid: usize,
        dropout: f32,
        rng: &mut R,
    ) -> Result<Self> {
        if n_vars == 0 || n_terms == 0 || mid == 0 {
            return Err(MlErr::InvalidInput("encoder widths must be positive"));
        }

        let layers = vec![
            Layer::dense((n_vars, mid)),
            Layer::batch_norm(mid),
            Layer::elu(),
            Layer::dropout(dropout, rng.random())?,
            Layer::dense((mid, mid)),
            Layer::batch_norm(mid),
            Layer::elu(),
            Layer::dropout(dropout, rng.random())?,
            Layer::dense((mid, n_terms)),
        ];

        Self::new(layers, (n_vars, n_terms), rng)
    }

}

impl Encoder for FeedForwardEncoder {
    fn n_in(&self) -> usize {
        self.dim.0
    }

    fn n_out(&self) -> usize {
        self.dim.1
    }

    fn n_params(&self) -> usize {
        self.params.len()
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn forward(&mut self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let Self {
            layers,
            params,
            mode,
            ..
        } = self;

        let mut rest = params.as_slice();
        let mut out = x.to_owned();

        for layer in layers.iter_mut() {
            let (chunk, tail) = rest.split_at(layer.size());
            out = layer.forward(chunk, out.view(), *mode)?;
            rest = tail;
        }

        Ok(out)
    }

    fn backward(&mut self, d: ArrayView2<f32>) -> Result<()> {
        let Self {
            layers,
            params,
            grad,
            ..
        } = self;

        let mut params_rest = params.as_slice();
        let mut grad_rest = grad.as_mut_slice();
        let mut d = d.to_owned();

        for layer in layers.iter_mut().rev() {
            let at = params_rest.len() - layer.size();
            let (params_head, chunk) = params_rest.split_at(at);
            let (grad_head, grad_chunk) = mem::take(&mut grad_rest).split_at_mut(at);

            d = layer.backward(chunk, grad_chunk, d.view())?;
            params_rest = params_head;
            grad_rest = grad_head;
        }

        Ok(())
    }

    fn param_group(&mut self) -> (&mut [f32], &mut [f32]) {
        (self.params.as_mut_slice(), self.grad.as_mut_slice())
    }
}

use ndarray::{Array2, ArrayView2};
use rand::Rng;

use super::{
    Mode,
    decoder::{CompositeLinearDecoder, TermKind},
    encoder::{Encoder, FeedForwardEncoder},
};
use crate::{MlErr, Result, configs::ModelConfig};

/// An encoder followed by a composite linear decoder.
///
/// Trainable parameters are split in groups: the encoder's buffer first, then one group per
/// decoder block in `TermKind::ALL` order.
#[derive(Debug, Clone)]
pub struct Autoencoder<E: Encoder> {
    encoder: E,
    decoder: CompositeLinearDecoder,
}

impl Autoencoder<FeedForwardEncoder> {
    /// Builds the default feed forward autoencoder for `n_vars` genes.
    ///
    /// # Arguments
    /// * `n_vars` - The amount of genes.
    /// * `config` - The sizes of each kind of term and the hidden layers.
    /// * `rng` - A random number generator.
    pub fn feed_forward<R: Rng + ?Sized>(
        n_vars: usize,
        config: &ModelConfig,
        rng: &mut R,
    ) -> Result<Self> {
        let decoder = CompositeLinearDecoder::new(
            n_vars,
            config.n_ann,
            config.n_sparse,
            config.n_dense,
            rng,
        )?;
        let encoder = FeedForwardEncoder::feed_forward(
            n_vars,
            decoder.n_terms(),
            config.mid_layers_size,
            config.dropout_rate,
            rng,
        )?;

        Self::new(encoder, decoder)
    }
}

impl<E: Encoder> Autoencoder<E> {
    /// Creates a new `Autoencoder` in train mode.
    ///
    /// # Errors
    /// `ShapeMismatch` if the encoder's widths don't match the decoder's.
    pub fn new(mut encoder: E, decoder: CompositeLinearDecoder) -> Result<Self> {
        let got = (encoder.n_in(), encoder.n_out());
        let expected = (decoder.n_vars(), decoder.n_terms());
        if got != expected {
            return Err(MlErr::ShapeMismatch {
                what: "encoder widths",
                got,
                expected,
            });
        }

        encoder.set_mode(Mode::Train);
        Ok(Self { encoder, decoder })
    }

    pub fn decoder(&self) -> &CompositeLinearDecoder {
        &self.decoder
    }

    pub fn decoder_mut(&mut self) -> &mut CompositeLinearDecoder {
        &mut self.decoder
    }

    pub fn n_vars(&self) -> usize {
        self.decoder.n_vars()
    }

    pub fn n_terms(&self) -> usize {
        self.decoder.n_terms()
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.encoder.set_mode(mode);
    }

    /// Encodes and decodes a batch.
    ///
    /// # Returns
    /// The latent batch and the reconstructed batch.
    pub fn forward(&mut self, x: ArrayView2<f32>) -> Result<(Array2<f32>, Array2<f32>)> {
        if x.ncols() != self.n_vars() {
            return Err(MlErr::ShapeMismatch {
                what: "autoencoder input",
                got: x.dim(),
                expected: (x.nrows(), self.n_vars()),
            });
        }

        let encoded = self.encoder.forward(x)?;
        let decoded = self.decoder.forward(encoded.view())?;
        Ok((encoded, decoded))
    }

    /// Accumulates the gradient of every parameter group.
    ///
    /// # Arguments
    /// * `encoded` - The latent batch of the last train mode forward pass.
    /// * `d_encoded` - The loss gradient taken directly with respect to the latent batch.
    /// * `d_decoded` - The loss gradient with respect to the reconstruction.
    pub fn backward(
        &mut self,
        encoded: ArrayView2<f32>,
        d_encoded: ArrayView2<f32>,
        d_decoded: ArrayView2<f32>,
    ) -> Result<()> {
        let d = self.decoder.backward(encoded, d_decoded)? + d_encoded;
        self.encoder.backward(d.view())
    }

    /// Returns the length of each parameter group.
    pub fn param_group_sizes(&self) -> Vec<usize> {
        let encoder = self.encoder.n_params();
        let blocks = self.decoder.blocks().map(|b| b.weights().len());
        std::iter::once(encoder).chain(blocks).collect()
    }

    /// Gives every parameter group as `(params, grad)` flat slices.
    ///
    /// # Errors
    /// `InvalidInput` if a decoder block is not contiguous in memory.
    pub fn param_groups(&mut self) -> Result<Vec<(&mut [f32], &mut [f32])>> {
        let mut groups = vec![self.encoder.param_group()];

        for block in self.decoder.blocks_mut() {
            let group = block
                .param_group()
                .ok_or(MlErr::InvalidInput("decoder weights are not contiguous"))?;
            groups.push(group);
        }

        Ok(groups)
    }

    /// Returns the weights of the annotated block, if the decoder has one.
    pub fn annotated_weights(&self) -> Option<ArrayView2<'_, f32>> {
        self.decoder.block(TermKind::Annotated).map(|b| b.weights())
    }
}

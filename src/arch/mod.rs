mod autoencoder;
pub mod decoder;
mod encoder;
pub mod layers;
pub mod loss;

pub use autoencoder::Autoencoder;
pub use decoder::{CompositeLinearDecoder, TermKind, WeightBlock};
pub use encoder::{Encoder, FeedForwardEncoder};

/// Whether layers cache what they need for backpropagation and use batch statistics, or run
/// deterministically.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Train,
    Eval,
}

impl Mode {
    pub fn is_train(self) -> bool {
        self == Mode::Train
    }

    pub fn is_eval(self) -> bool {
        self == Mode::Eval
    }
}

use serde::{Deserialize, Serialize};

/// The sizes of the autoencoder.
///
/// A term kind left out (or sized zero) gets no decoder block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub n_ann: Option<usize>,
    #[serde(default)]
    pub n_sparse: Option<usize>,
    #[serde(default)]
    pub n_dense: Option<usize>,
    #[serde(default = "default_mid_layers_size")]
    pub mid_layers_size: usize,
    #[serde(default = "default_dropout_rate")]
    pub dropout_rate: f32,
}

fn default_mid_layers_size() -> usize {
    400
}

fn default_dropout_rate() -> f32 {
    0.2
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_ann: None,
            n_sparse: None,
            n_dense: None,
            mid_layers_size: default_mid_layers_size(),
            dropout_rate: default_dropout_rate(),
        }
    }
}

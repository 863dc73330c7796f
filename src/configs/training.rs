use std::num::NonZeroUsize;

use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::{
    optimization::{Adam, GradientDescent, GradientDescentWithMomentum, Optimizer},
    prox::RegularizationCoeffs,
};

/// The optimizer used for every parameter group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerConfig {
    Adam {
        learning_rate: f32,
        #[serde(default = "default_beta1")]
        beta1: f32,
        #[serde(default = "default_beta2")]
        beta2: f32,
        #[serde(default = "default_epsilon")]
        epsilon: f32,
    },
    GradientDescent {
        learning_rate: f32,
    },
    GradientDescentWithMomentum {
        learning_rate: f32,
        momentum: f32,
    },
}

fn default_beta1() -> f32 {
    0.9
}

fn default_beta2() -> f32 {
    0.999
}

fn default_epsilon() -> f32 {
    1e-8
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig::Adam {
            learning_rate: 1e-3,
            beta1: default_beta1(),
            beta2: default_beta2(),
            epsilon: default_epsilon(),
        }
    }
}

impl OptimizerConfig {
    /// Builds an optimizer for a parameter group.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters in the group.
    pub fn build(&self, len: usize) -> Box<dyn Optimizer> {
        match *self {
            OptimizerConfig::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
            } => Box::new(Adam::new(len, learning_rate, beta1, beta2, epsilon)),
            OptimizerConfig::GradientDescent { learning_rate } => {
                Box::new(GradientDescent::new(learning_rate))
            }
            OptimizerConfig::GradientDescentWithMomentum {
                learning_rate,
                momentum,
            } => Box::new(GradientDescentWithMomentum::new(
                len,
                learning_rate,
                momentum,
            )),
        }
    }
}

/// The hyperparameters of the proximal training loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub batch_size: NonZeroUsize,
    pub epochs: usize,
    /// Weight of the penalty anchoring the latent code at zero.
    #[serde(default = "default_lambda0")]
    pub lambda0: f32,
    #[serde(default)]
    pub lambda1: Option<f32>,
    #[serde(default)]
    pub lambda2: Option<f32>,
    #[serde(default)]
    pub lambda3: Option<f32>,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    /// Batch losses are reported every `log_every` steps.
    #[serde(default = "default_log_every")]
    pub log_every: NonZeroUsize,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_lambda0() -> f32 {
    0.1
}

fn default_log_every() -> NonZeroUsize {
    NonZeroUsize::new(100).unwrap_or(NonZeroUsize::MIN)
}

impl TrainConfig {
    /// Creates a config with the default optimizer, no proximal penalties and no seed.
    pub fn new(batch_size: NonZeroUsize, epochs: usize) -> Self {
        Self {
            batch_size,
            epochs,
            lambda0: default_lambda0(),
            lambda1: None,
            lambda2: None,
            lambda3: None,
            optimizer: OptimizerConfig::default(),
            log_every: default_log_every(),
            seed: None,
        }
    }

    pub fn coeffs(&self) -> RegularizationCoeffs {
        RegularizationCoeffs {
            lambda1: self.lambda1,
            lambda2: self.lambda2,
            lambda3: self.lambda3,
        }
    }

    /// Returns a generator seeded with `seed`, or from the OS when there is none.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

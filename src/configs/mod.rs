mod model;
mod run;
mod training;

pub use model::ModelConfig;
pub use run::{DataConfig, RunConfig};
pub use training::{OptimizerConfig, TrainConfig};

//! An autoencoder whose linear decoder is split into annotated, sparse and dense blocks, each
//! pushed toward its own sparsity structure by proximal gradient steps.

pub mod annotations;
pub mod arch;
pub mod configs;
pub mod dataset;
pub mod error;
pub mod optimization;
pub mod prox;
pub mod training;

pub use error::{MlErr, Result};

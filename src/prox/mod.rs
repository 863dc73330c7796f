//! Proximal operators for the decoder weights and their per-block composition.

mod group_l2;
mod l1;
mod pipeline;
mod registry;

pub use group_l2::ProxGroupL2;
pub use l1::{ProxL1, soft_threshold};
pub use pipeline::{ProxOp, ProxPipeline};
pub use registry::{ProxRegistry, RegularizationCoeffs};

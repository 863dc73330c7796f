mod batch_norm;
mod dense;
mod dropout;
mod elu;
mod layer;

pub use batch_norm::BatchNorm;
pub use dense::Dense;
pub use dropout::Dropout;
pub use elu::Elu;
pub use layer::Layer;

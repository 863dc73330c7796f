mod loss_fn;
mod sse;

pub use loss_fn::LossFn;
pub use sse::Sse;

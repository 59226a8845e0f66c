//! Ground truth to anchor assignment and target encoding.

mod encoder;
mod objectness;
mod tensor;

pub use encoder::*;
pub use objectness::*;
pub use tensor::*;

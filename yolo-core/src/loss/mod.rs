//! Loss function building blocks.

mod loss;
mod misc;
mod prediction;

pub use loss::*;
pub use misc::*;
pub use prediction::*;

//! Tensor utilities for batched box computation.

mod common;
pub mod cxcywh_tensor;
pub mod tensor;
pub mod xyxy_tensor;

pub use cxcywh_tensor::*;
pub use tensor::*;
pub use xyxy_tensor::*;

pub use anyhow::{ensure, Error, Result};
pub use bbox::Element;
pub use getset::Getters;
pub use maplit::hashset;
pub use std::convert::TryFrom;
pub use tch::{Device, Kind, Tensor};
pub use tch_tensor_like::TensorLike;

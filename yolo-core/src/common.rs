pub use anyhow::{bail, ensure, format_err, Context as _, Error, Result};
pub use getset::Getters;
pub use itertools::{chain, iproduct, izip, Itertools as _};
pub use log::{debug, info, warn};
pub use ndarray::{s, Array2, Array3, Array4, ArrayView4, ArrayViewMut4, Axis};
pub use noisy_float::prelude::*;
pub use serde::{Deserialize, Serialize};
pub use std::{
    borrow::Borrow,
    convert::{TryFrom, TryInto},
    iter,
    path::Path,
};
pub use tch::{Device, IndexOp, Kind, Reduction, Tensor};
pub use tch_tensor_like::TensorLike;

use super::{AnchorTarget, NUM_CHANNELS};
use crate::common::*;

/// Assignment counts of one scale level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleStat {
    pub stride: usize,
    pub grid_size: [usize; 2],
    pub num_positive: usize,
    pub num_ignored: usize,
}

/// The encoded training target of a batch.
///
/// Each scale level keeps an array indexed by
/// `[batch, grid_y, grid_x, anchor_index]`.
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct TargetTensor {
    #[get = "pub"]
    pub(crate) strides: Vec<usize>,
    #[get = "pub"]
    pub(crate) scales: Vec<Array4<AnchorTarget>>,
}

impl TargetTensor {
    pub fn batch_size(&self) -> usize {
        self.scales[0].shape()[0]
    }

    /// The number of anchor cells per image over all scales.
    pub fn num_entries(&self) -> usize {
        self.scales
            .iter()
            .map(|scale| scale.len_of(Axis(1)) * scale.len_of(Axis(2)) * scale.len_of(Axis(3)))
            .sum()
    }

    /// Look up an anchor cell.
    pub fn get(
        &self,
        scale_index: usize,
        batch_index: usize,
        grid_y: usize,
        grid_x: usize,
        anchor_index: usize,
    ) -> Option<&AnchorTarget> {
        self.scales
            .get(scale_index)?
            .get([batch_index, grid_y, grid_x, anchor_index])
    }

    /// Iterate over the cells of an image in flattened order.
    ///
    /// The order is scale level first, then `(grid_y, grid_x, anchor_index)`
    /// in row-major order, which is the order of the prediction entries.
    pub fn image_entries(&self, batch_index: usize) -> impl Iterator<Item = &AnchorTarget> {
        self.scales
            .iter()
            .flat_map(move |scale| scale.index_axis(Axis(0), batch_index).into_iter())
    }

    /// Serialize into an array of shape `[batch, num_entries, 11]`.
    pub fn to_array(&self) -> Array3<f32> {
        let batch_size = self.batch_size();
        let num_entries = self.num_entries();

        let mut array = Array3::zeros([batch_size, num_entries, NUM_CHANNELS]);
        array
            .outer_iter_mut()
            .enumerate()
            .for_each(|(batch_index, mut image)| {
                izip!(image.outer_iter_mut(), self.image_entries(batch_index)).for_each(
                    |(mut row, target)| {
                        izip!(row.iter_mut(), target.to_channels())
                            .for_each(|(dst, src)| *dst = src);
                    },
                );
            });
        array
    }

    /// Serialize into a float tensor of shape `[batch, num_entries, 11]`.
    pub fn to_tensor(&self, device: Device) -> Tensor {
        let array = self.to_array();
        let (batch_size, num_entries, num_channels) = array.dim();
        Tensor::of_slice(&array.into_raw_vec())
            .view([batch_size as i64, num_entries as i64, num_channels as i64])
            .set_requires_grad(false)
            .to_device(device)
    }

    /// Count positive and ignored cells per scale level.
    pub fn stats(&self) -> Vec<ScaleStat> {
        izip!(&self.strides, &self.scales)
            .map(|(&stride, scale)| {
                let (num_positive, num_ignored) =
                    scale
                        .iter()
                        .fold((0, 0), |(num_positive, num_ignored), target| {
                            (
                                num_positive + target.objectness.is_positive() as usize,
                                num_ignored + target.objectness.is_ignored() as usize,
                            )
                        });

                ScaleStat {
                    stride,
                    grid_size: [scale.len_of(Axis(1)), scale.len_of(Axis(2))],
                    num_positive,
                    num_ignored,
                }
            })
            .collect()
    }

    pub fn num_positive(&self) -> usize {
        self.stats().iter().map(|stat| stat.num_positive).sum()
    }
}

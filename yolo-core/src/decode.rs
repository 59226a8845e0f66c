//! Decoding of raw box regression outputs.

use crate::{anchor::AnchorTemplates, common::*};
use tch_goodies::{CxCyWHTensor, CxCyWHTensorUnchecked, XyxyTensor};

/// Per-entry grid offsets and anchor sizes in the flattened prediction order.
///
/// Each tensor has shape `[1, num_entries, 1]` so that it broadcasts over
/// the batch dimension.
#[derive(Debug, TensorLike, Getters)]
pub struct AnchorGrid {
    #[tensor_like(copy)]
    #[get = "pub"]
    input_size: [usize; 2],
    grid_x: Tensor,
    grid_y: Tensor,
    stride: Tensor,
    anchor_w: Tensor,
    anchor_h: Tensor,
}

impl AnchorGrid {
    pub fn new(anchors: &AnchorTemplates, input_size: [usize; 2], device: Device) -> Result<Self> {
        let grid_sizes = anchors.grid_sizes(input_size)?;

        let mut grid_x = vec![];
        let mut grid_y = vec![];
        let mut stride = vec![];
        let mut anchor_w = vec![];
        let mut anchor_h = vec![];

        izip!(0.., grid_sizes, anchors.strides()).for_each(
            |(scale_index, [grid_h, grid_w], &scale_stride)| {
                let scale_anchors = anchors.scale_anchors(scale_index);
                iproduct!(0..grid_h, 0..grid_w, scale_anchors).for_each(|(row, col, anchor)| {
                    grid_x.push(col as f32);
                    grid_y.push(row as f32);
                    stride.push(scale_stride as f32);
                    anchor_w.push(anchor.w() as f32);
                    anchor_h.push(anchor.h() as f32);
                });
            },
        );

        let to_tensor = |values: Vec<f32>| {
            Tensor::of_slice(&values)
                .view([1, -1, 1])
                .set_requires_grad(false)
                .to_device(device)
        };

        Ok(Self {
            input_size,
            grid_x: to_tensor(grid_x),
            grid_y: to_tensor(grid_y),
            stride: to_tensor(stride),
            anchor_w: to_tensor(anchor_w),
            anchor_h: to_tensor(anchor_h),
        })
    }

    pub fn num_entries(&self) -> i64 {
        self.grid_x.size()[1]
    }

    /// Decode `[batch, num_entries, 4]` raw `tx, ty, tw, th` into normalized center boxes.
    pub fn decode_cxcywh(&self, txtytwth: &Tensor) -> Result<CxCyWHTensor> {
        let (_batch_size, num_entries, num_params) = txtytwth.size3()?;
        ensure!(
            num_entries == self.num_entries() && num_params == 4,
            "expect shape [_, {}, 4], but get {:?}",
            self.num_entries(),
            txtytwth.size()
        );

        let [height, width] = self.input_size;
        let (height, width) = (height as f64, width as f64);

        let tx = txtytwth.narrow(-1, 0, 1);
        let ty = txtytwth.narrow(-1, 1, 1);
        let tw = txtytwth.narrow(-1, 2, 1);
        let th = txtytwth.narrow(-1, 3, 1);

        let cx = (tx.sigmoid() + &self.grid_x) * &self.stride / width;
        let cy = (ty.sigmoid() + &self.grid_y) * &self.stride / height;
        let w = tw.exp() * &self.anchor_w / width;
        let h = th.exp() * &self.anchor_h / height;

        CxCyWHTensorUnchecked { cx, cy, w, h }.try_into()
    }

    /// Decode `[batch, num_entries, 4]` raw `tx, ty, tw, th` into normalized corner boxes.
    pub fn decode(&self, txtytwth: &Tensor) -> Result<XyxyTensor> {
        Ok(self.decode_cxcywh(txtytwth)?.to_xyxy())
    }
}

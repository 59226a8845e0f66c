use crate::{common::*, cxcywh_tensor::CxCyWHTensor};
use bbox::{Rect, XYXY};

/// Checked tensor of batched box parameters in XYXY format.
///
/// Every component has the same shape with a trailing singleton
/// dimension, for example `[num_boxes, 1]` or `[batch, num_anchors, 1]`.
#[derive(Debug, TensorLike, Getters)]
pub struct XyxyTensor {
    /// The left edge.
    #[get = "pub"]
    pub(crate) xmin: Tensor,
    /// The top edge.
    #[get = "pub"]
    pub(crate) ymin: Tensor,
    /// The right edge.
    #[get = "pub"]
    pub(crate) xmax: Tensor,
    /// The bottom edge.
    #[get = "pub"]
    pub(crate) ymax: Tensor,
}

/// Unchecked tensor of batched box parameters in XYXY format.
#[derive(Debug, TensorLike)]
pub struct XyxyTensorUnchecked {
    pub xmin: Tensor,
    pub ymin: Tensor,
    pub xmax: Tensor,
    pub ymax: Tensor,
}

impl XyxyTensor {
    /// Split a tensor whose last dimension holds `[xmin, ymin, xmax, ymax]`.
    pub fn from_tensor(tensor: &Tensor) -> Result<Self> {
        let size = tensor.size();
        ensure!(
            size.last() == Some(&4),
            "expect the last dimension to be 4, but get shape {:?}",
            size
        );

        XyxyTensorUnchecked {
            xmin: tensor.narrow(-1, 0, 1),
            ymin: tensor.narrow(-1, 1, 1),
            xmax: tensor.narrow(-1, 2, 1),
            ymax: tensor.narrow(-1, 3, 1),
        }
        .try_into()
    }

    /// Concatenate the components back into a `[.., 4]` tensor.
    pub fn to_tensor(&self) -> Tensor {
        let Self {
            xmin,
            ymin,
            xmax,
            ymax,
        } = self;
        Tensor::cat(&[xmin, ymin, xmax, ymax], -1)
    }

    pub fn device(&self) -> Device {
        self.xmin.device()
    }

    /// Compute the box width and height.
    pub fn size(&self) -> (Tensor, Tensor) {
        let Self {
            xmin,
            ymin,
            xmax,
            ymax,
        } = self;
        (xmax - xmin, ymax - ymin)
    }

    pub fn area(&self) -> Tensor {
        let (w, h) = self.size();
        w * h
    }

    /// Compute the intersection area with the other box tensor.
    pub fn intersect_area_with(&self, other: &Self) -> Tensor {
        let Self {
            xmin: lhs_xmin,
            ymin: lhs_ymin,
            xmax: lhs_xmax,
            ymax: lhs_ymax,
        } = self;
        let Self {
            xmin: rhs_xmin,
            ymin: rhs_ymin,
            xmax: rhs_xmax,
            ymax: rhs_ymax,
        } = other;

        let max_xmin = lhs_xmin.maximum(rhs_xmin);
        let max_ymin = lhs_ymin.maximum(rhs_ymin);
        let min_xmax = lhs_xmax.minimum(rhs_xmax);
        let min_ymax = lhs_ymax.minimum(rhs_ymax);

        let inner_w = (min_xmax - max_xmin).clamp_min(0.0);
        let inner_h = (min_ymax - max_ymin).clamp_min(0.0);

        inner_w * inner_h
    }

    /// Compute the rectangle closure with the other box tensor.
    pub fn closure_with(&self, other: &Self) -> Self {
        let Self {
            xmin: lhs_xmin,
            ymin: lhs_ymin,
            xmax: lhs_xmax,
            ymax: lhs_ymax,
        } = self;
        let Self {
            xmin: rhs_xmin,
            ymin: rhs_ymin,
            xmax: rhs_xmax,
            ymax: rhs_ymax,
        } = other;

        Self {
            xmin: lhs_xmin.minimum(rhs_xmin),
            ymin: lhs_ymin.minimum(rhs_ymin),
            xmax: lhs_xmax.maximum(rhs_xmax),
            ymax: lhs_ymax.maximum(rhs_ymax),
        }
    }

    pub fn iou_with(&self, other: &Self) -> Tensor {
        let inter_area = self.intersect_area_with(other);
        let union_area = self.area() + other.area() - &inter_area + f64::IOU_EPSILON;
        inter_area / union_area
    }

    /// Squared distance between the box centers.
    pub fn center_distance_square_to(&self, other: &Self) -> Tensor {
        let lhs = CxCyWHTensor::from(self);
        let rhs = CxCyWHTensor::from(other);
        (rhs.cx - lhs.cx).square() + (rhs.cy - lhs.cy).square()
    }

    pub fn diou_with(&self, other: &Self) -> Tensor {
        let iou = self.iou_with(other);
        self.diou_penalty_with(other, iou)
    }

    /// The aspect ratio consistency term of CIoU.
    pub fn aspect_penalty_with(&self, other: &Self) -> Tensor {
        let (lhs_w, lhs_h) = self.size();
        let (rhs_w, rhs_h) = other.size();
        let lhs_angle = (lhs_w / (lhs_h + f64::ASPECT_EPSILON)).atan();
        let rhs_angle = (rhs_w / (rhs_h + f64::ASPECT_EPSILON)).atan();
        ((lhs_angle - rhs_angle).square() + f64::ASPECT_EPSILON) * f64::ASPECT_PENALTY_SCALE
    }

    /// Compute the CIoU score.
    ///
    /// The IoU inside the trade-off factor is detached from the graph, so
    /// gradients only flow through the DIoU term and the aspect penalty.
    pub fn ciou_with(&self, other: &Self) -> Tensor {
        let iou = self.iou_with(other);
        let v = self.aspect_penalty_with(other);
        let alpha = &v / ((1.0 - &iou.detach()) + &v);
        self.diou_penalty_with(other, iou) - alpha * v
    }

    fn diou_penalty_with(&self, other: &Self, iou: Tensor) -> Tensor {
        let (closure_w, closure_h) = self.closure_with(other).size();
        let diagonal_square = closure_w.square() + closure_h.square();
        let penalty =
            self.center_distance_square_to(other) / (diagonal_square + f64::IOU_EPSILON);
        iou - penalty
    }
}

impl TryFrom<XyxyTensorUnchecked> for XyxyTensor {
    type Error = Error;

    fn try_from(from: XyxyTensorUnchecked) -> Result<Self, Self::Error> {
        let XyxyTensorUnchecked {
            xmin,
            ymin,
            xmax,
            ymax,
        } = from;

        let size = xmin.size();
        ensure!(
            size.len() >= 2 && size.last() == Some(&1),
            "expect shape [.., 1], but get {:?}",
            size
        );
        ensure!(
            ymin.size() == size && xmax.size() == size && ymax.size() == size,
            "size mismatch"
        );
        ensure!(
            hashset! {
                xmin.device(),
                ymin.device(),
                xmax.device(),
                ymax.device(),
            }
            .len()
                == 1,
            "device mismatch"
        );

        Ok(Self {
            xmin,
            ymin,
            xmax,
            ymax,
        })
    }
}

impl From<&CxCyWHTensor> for XyxyTensor {
    fn from(from: &CxCyWHTensor) -> Self {
        let CxCyWHTensor { cx, cy, w, h } = from;

        let xmin = cx - w / 2.0;
        let xmax = cx + w / 2.0;
        let ymin = cy - h / 2.0;
        let ymax = cy + h / 2.0;

        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }
}

impl From<&[XYXY<f64>]> for XyxyTensor {
    fn from(from: &[XYXY<f64>]) -> Self {
        let to_column = |values: Vec<f32>| Tensor::of_slice(&values).view([-1, 1]);

        let xmin = to_column(from.iter().map(|rect| rect.xmin() as f32).collect());
        let ymin = to_column(from.iter().map(|rect| rect.ymin() as f32).collect());
        let xmax = to_column(from.iter().map(|rect| rect.xmax() as f32).collect());
        let ymax = to_column(from.iter().map(|rect| rect.ymax() as f32).collect());

        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }
}

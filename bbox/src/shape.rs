//! Shape-only matching between anchor templates and ground truth boxes.

use super::{CxCyWH, Rect, WH};
use crate::{common::*, element::Element};

/// Wrap anchor sizes into boxes centered at the origin.
///
/// The returned boxes carry no position. They are only meant to be
/// compared by shape with [compute_iou].
pub fn set_anchors<T>(anchor_sizes: &[WH<T>]) -> Vec<CxCyWH<T>>
where
    T: Copy + Num + PartialOrd,
{
    anchor_sizes
        .iter()
        .map(|size| CxCyWH {
            cx: T::zero(),
            cy: T::zero(),
            w: size.w(),
            h: size.h(),
        })
        .collect()
}

/// Compute the IoU of each anchor box against one ground truth box.
///
/// Both sides are expected to be centered at the origin, which makes the
/// score depend on the box shapes only. The intersection is not clamped,
/// and no validity checks are performed.
pub fn compute_iou<T>(anchor_boxes: &[CxCyWH<T>], gt_box: &CxCyWH<T>) -> Vec<T>
where
    T: Element,
{
    let gt_area = gt_box.w() * gt_box.h();

    anchor_boxes
        .iter()
        .map(|anchor| {
            let anchor_area = anchor.w() * anchor.h();
            let inter_w = gt_box.xmax().min(anchor.xmax()) - gt_box.xmin().max(anchor.xmin());
            let inter_h = gt_box.ymax().min(anchor.ymax()) - gt_box.ymin().max(anchor.ymin());
            let inter_area = inter_w * inter_h;
            let union_area = gt_area + anchor_area - inter_area + T::IOU_EPSILON;
            inter_area / union_area
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RectNum;
    use approx::assert_abs_diff_eq;

    fn anchors(sizes: &[[f64; 2]]) -> Vec<CxCyWH<f64>> {
        let sizes: Vec<_> = sizes.iter().map(|&wh| WH::from_wh(wh)).collect();
        set_anchors(&sizes)
    }

    #[test]
    fn anchors_are_centered_at_origin() {
        let boxes = anchors(&[[10.0, 20.0], [4.0, 4.0]]);
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0], CxCyWH::from_cxcywh([0.0, 0.0, 10.0, 20.0]));
        assert_eq!(boxes[1], CxCyWH::from_cxcywh([0.0, 0.0, 4.0, 4.0]));
    }

    #[test]
    fn identical_shape_scores_one() {
        let boxes = anchors(&[[10.0, 10.0], [4.0, 4.0], [8.0, 8.0], [16.0, 16.0]]);
        let gt = CxCyWH::from_cxcywh([0.0, 0.0, 10.0, 10.0]);
        let ious = compute_iou(&boxes, &gt);

        assert_eq!(ious[0], 1.0);
        assert_abs_diff_eq!(ious[1], 0.16, epsilon = 1e-12);
        assert_abs_diff_eq!(ious[2], 0.64, epsilon = 1e-12);
        assert_abs_diff_eq!(ious[3], 100.0 / 256.0, epsilon = 1e-12);
    }

    #[test]
    fn nested_shapes() {
        // a 10x40 box against a 20x20 anchor: intersection 10x20
        let boxes = anchors(&[[20.0, 20.0]]);
        let gt = CxCyWH::from_cxcywh([0.0, 0.0, 10.0, 40.0]);
        let ious = compute_iou(&boxes, &gt);
        assert_abs_diff_eq!(ious[0], 200.0 / 600.0, epsilon = 1e-12);
    }
}

use super::{AnchorTarget, BoxEncoding, TargetTensor};
use crate::{anchor::AnchorTemplates, common::*};
use bbox::{shape, CxCyWH, RectNum};
use label::RatioLabel;
use ndarray::ArrayViewMut3;

/// The builder of [TargetEncoder].
#[derive(Debug, Clone)]
pub struct TargetEncoderInit {
    pub anchors: AnchorTemplates,
    /// Anchors whose shape IoU with a ground truth is strictly greater
    /// than this value, except the best one, are ignored.
    pub ignore_thresh: f64,
}

impl TargetEncoderInit {
    pub fn build(self) -> Result<TargetEncoder> {
        let Self {
            anchors,
            ignore_thresh,
        } = self;

        ensure!(
            ignore_thresh.is_finite() && ignore_thresh >= 0.0,
            "ignore_thresh must be a non-negative finite number, but get {}",
            ignore_thresh
        );

        let anchor_boxes = anchors.anchor_boxes();

        Ok(TargetEncoder {
            anchors,
            anchor_boxes,
            ignore_thresh,
        })
    }
}

/// Assigns ground truth boxes to anchors and encodes training targets.
#[derive(Debug, Clone, Getters)]
pub struct TargetEncoder {
    #[get = "pub"]
    anchors: AnchorTemplates,
    anchor_boxes: Vec<CxCyWH<f64>>,
    #[get = "pub"]
    ignore_thresh: f64,
}

impl TargetEncoder {
    /// Encode the labels of a batch.
    ///
    /// `input_size` is `[height, width]` in pixels and `label_lists` holds
    /// the labels of each image.
    pub fn encode(
        &self,
        input_size: [usize; 2],
        label_lists: &[Vec<RatioLabel>],
    ) -> Result<TargetTensor> {
        let grid_sizes = self.anchors.grid_sizes(input_size)?;
        let batch_size = label_lists.len();
        let anchors_per_scale = self.anchors.anchors_per_scale();

        let mut scales: Vec<Array4<AnchorTarget>> = grid_sizes
            .iter()
            .map(|&[grid_h, grid_w]| {
                Array4::default([batch_size, grid_h, grid_w, anchors_per_scale])
            })
            .collect();

        for (batch_index, labels) in label_lists.iter().enumerate() {
            let mut views: Vec<ArrayViewMut3<AnchorTarget>> = scales
                .iter_mut()
                .map(|scale| scale.index_axis_mut(Axis(0), batch_index))
                .collect();
            self.encode_image_into(input_size, labels, &mut views);
        }

        let target = TargetTensor {
            strides: self.anchors.strides().clone(),
            scales,
        };

        let num_labels: usize = label_lists.iter().map(|labels| labels.len()).sum();
        if num_labels > 0 && target.num_positive() == 0 {
            warn!(
                "none of the {} ground truth boxes in the batch is assigned to an anchor",
                num_labels
            );
        }

        Ok(target)
    }

    /// Encode the labels of a single image.
    ///
    /// It returns one array per scale level indexed by
    /// `[grid_y, grid_x, anchor_index]`.
    pub fn encode_image(
        &self,
        input_size: [usize; 2],
        labels: &[RatioLabel],
    ) -> Result<Vec<Array3<AnchorTarget>>> {
        let anchors_per_scale = self.anchors.anchors_per_scale();
        let mut scales: Vec<Array3<AnchorTarget>> = self
            .anchors
            .grid_sizes(input_size)?
            .into_iter()
            .map(|[grid_h, grid_w]| Array3::default([grid_h, grid_w, anchors_per_scale]))
            .collect();

        let mut views: Vec<_> = scales.iter_mut().map(|scale| scale.view_mut()).collect();
        self.encode_image_into(input_size, labels, &mut views);

        Ok(scales)
    }

    fn encode_image_into(
        &self,
        input_size: [usize; 2],
        labels: &[RatioLabel],
        scales: &mut [ArrayViewMut3<AnchorTarget>],
    ) {
        let [height, width] = input_size;
        let (height, width) = (height as f64, width as f64);

        for label in labels {
            let bbox = label.to_f64_rect();
            let gt_box = bbox.scale_xy(width, height).to_cxcywh();
            let [cx, cy, box_w, box_h] = gt_box.cxcywh();

            if box_w < 1.0 || box_h < 1.0 {
                debug!(
                    "skip ground truth {:?} smaller than one pixel ({}x{})",
                    bbox.xyxy(),
                    box_w,
                    box_h
                );
                continue;
            }

            let gt_shape = CxCyWH::from_cxcywh([0.0, 0.0, box_w, box_h]);
            let ious = shape::compute_iou(&self.anchor_boxes, &gt_shape);

            // the first maximum wins ties
            let best_index = ious
                .iter()
                .enumerate()
                .fold(None, |best: Option<(usize, f64)>, (index, &iou)| match best {
                    Some((_, best_iou)) if best_iou >= iou => best,
                    _ => Some((index, iou)),
                })
                .map(|(index, _)| index);
            let best_index = match best_index {
                Some(index) => index,
                None => continue,
            };

            ious.iter()
                .enumerate()
                .filter(|&(index, &iou)| index != best_index && iou > self.ignore_thresh)
                .for_each(|(index, _)| match self.locate_cell(scales, index, cx, cy) {
                    Some(cell) => cell.mark_ignored(),
                    None => debug!(
                        "drop ignored anchor {} of ground truth {:?} outside the grid",
                        index,
                        bbox.xyxy()
                    ),
                });

            let (scale_index, _) = self.anchors.locate(best_index);
            let stride = self.anchors.strides()[scale_index] as f64;
            let anchor = self.anchors.anchors()[best_index];

            let cx_s = cx / stride;
            let cy_s = cy / stride;
            let encoding = BoxEncoding {
                class_id: label.class,
                tx: cx_s - cx_s.floor(),
                ty: cy_s - cy_s.floor(),
                tw: (box_w / anchor.w()).ln(),
                th: (box_h / anchor.h()).ln(),
                bbox,
            };
            let scale_weight = 2.0 - (box_w / width) * (box_h / height);

            match self.locate_cell(scales, best_index, cx, cy) {
                Some(cell) => *cell = AnchorTarget::positive(scale_weight, encoding),
                None => debug!(
                    "drop ground truth {:?} whose cell lies outside the stride {} grid",
                    bbox.xyxy(),
                    stride
                ),
            }
        }
    }

    /// Find the cell of a flat anchor index that contains a pixel center.
    fn locate_cell<'a>(
        &self,
        scales: &'a mut [ArrayViewMut3<AnchorTarget>],
        flat_index: usize,
        cx: f64,
        cy: f64,
    ) -> Option<&'a mut AnchorTarget> {
        let (scale_index, anchor_index) = self.anchors.locate(flat_index);
        let stride = self.anchors.strides()[scale_index] as f64;
        let grid_x = (cx / stride).floor();
        let grid_y = (cy / stride).floor();

        if grid_x < 0.0 || grid_y < 0.0 {
            return None;
        }

        scales[scale_index].get_mut([grid_y as usize, grid_x as usize, anchor_index])
    }
}

//! Defines loss for training.

use super::{BoxLossKind, ObjectnessLossKind, ObjectnessTarget, YoloPrediction};
use crate::{
    common::*,
    target::{
        BBOX_CHANNELS, CLASS_CHANNEL, NUM_CHANNELS, OBJECTNESS_CHANNEL, SCALE_WEIGHT_CHANNEL,
        TXTYTWTH_CHANNELS,
    },
};
use tch_goodies::{TensorExt as _, XyxyTensor};

pub use yolo_loss::*;
pub use yolo_loss_output::*;

const LOG_EPSILON: f64 = 1e-14;

mod yolo_loss {
    use super::*;

    #[derive(Debug, Clone)]
    pub struct YoloLossInit {
        pub num_classes: usize,
        pub objectness_loss_kind: Option<ObjectnessLossKind>,
        pub objectness_target: Option<ObjectnessTarget>,
        pub box_loss_kind: Option<BoxLossKind>,
    }

    impl YoloLossInit {
        pub fn new(num_classes: usize) -> Self {
            Self {
                num_classes,
                objectness_loss_kind: None,
                objectness_target: None,
                box_loss_kind: None,
            }
        }

        pub fn build(self) -> Result<YoloLoss> {
            let Self {
                num_classes,
                objectness_loss_kind,
                objectness_target,
                box_loss_kind,
            } = self;

            ensure!(num_classes > 0, "num_classes must be positive");

            let objectness_loss_kind = objectness_loss_kind.unwrap_or(ObjectnessLossKind::Mse);
            let objectness_target = objectness_target.unwrap_or(ObjectnessTarget::Binary);
            let box_loss_kind = box_loss_kind.unwrap_or(BoxLossKind::Decoupled);

            Ok(YoloLoss {
                num_classes,
                objectness_loss_kind,
                objectness_target,
                box_loss_kind,
            })
        }
    }

    /// Scores detector outputs against an encoded target tensor.
    #[derive(Debug, Clone, Getters)]
    pub struct YoloLoss {
        #[get = "pub"]
        num_classes: usize,
        #[get = "pub"]
        objectness_loss_kind: ObjectnessLossKind,
        #[get = "pub"]
        objectness_target: ObjectnessTarget,
        #[get = "pub"]
        box_loss_kind: BoxLossKind,
    }

    impl YoloLoss {
        /// Compute the losses.
        ///
        /// The `target` tensor has shape `[batch, entries, 11]` and is
        /// produced by `TargetTensor::to_tensor`.
        pub fn forward(
            &self,
            prediction: &YoloPrediction,
            target: &Tensor,
        ) -> Result<YoloLossOutput> {
            let (batch_size, num_entries, num_channels) = target.size3()?;
            ensure!(
                num_channels == NUM_CHANNELS as i64,
                "expect {} target channels, but get {}",
                NUM_CHANNELS,
                num_channels
            );
            ensure!(
                prediction.batch_size() == batch_size && prediction.num_entries() == num_entries,
                "prediction shape [{}, {}] does not match target shape [{}, {}]",
                prediction.batch_size(),
                prediction.num_entries(),
                batch_size,
                num_entries
            );
            ensure!(
                prediction.num_classes() == self.num_classes as i64,
                "expect {} classes, but get {}",
                self.num_classes,
                prediction.num_classes()
            );
            ensure!(
                !(self.box_loss_kind.requires_boxes()
                    || self.objectness_target == ObjectnessTarget::IoU)
                    || prediction.bbox().is_some(),
                "decoded boxes are required by {:?} box loss with {:?} objectness target",
                self.box_loss_kind,
                self.objectness_target
            );

            let target = target
                .to_device(prediction.device())
                .to_kind(Kind::Float)
                .set_requires_grad(false);
            let masks = TargetMasks::new(&target);

            let objectness_loss = self.objectness_loss(prediction, &target, &masks)?;
            let classification_loss = self.classification_loss(prediction, &target, &masks)?;
            let box_loss = self.box_loss(prediction, &target, &masks)?;
            let total_loss = &objectness_loss + &classification_loss + &box_loss;

            Ok(YoloLossOutput {
                objectness_loss,
                classification_loss,
                box_loss,
                total_loss,
            })
        }

        fn objectness_loss(
            &self,
            prediction: &YoloPrediction,
            target: &Tensor,
            masks: &TargetMasks,
        ) -> Result<Tensor> {
            let prob = prediction.objectness().squeeze_dim(-1).sigmoid();
            let target_score = self.objectness_score(prediction, target, masks)?;

            let (pos_loss, neg_loss) = match self.objectness_loss_kind {
                ObjectnessLossKind::Bce => {
                    let pos_loss = -(&target_score * (&prob + LOG_EPSILON).log()
                        + (1.0_f64 - &target_score) * (1.0_f64 - &prob + LOG_EPSILON).log());
                    let neg_loss = -(1.0_f64 - &prob + LOG_EPSILON).log();
                    (pos_loss, neg_loss)
                }
                ObjectnessLossKind::Mse => {
                    let pos_loss = (&prob - &target_score).square();
                    let neg_loss = prob.square();
                    (pos_loss, neg_loss)
                }
            };

            let (obj_weight, noobj_weight) = self.objectness_loss_kind.weights();
            let pos_loss = (pos_loss * &masks.objectness_pos).sum_per_sample_mean();
            let neg_loss = (neg_loss * &masks.objectness_neg).sum_per_sample_mean();

            Ok(pos_loss * obj_weight + neg_loss * noobj_weight)
        }

        /// The objectness value to be reached at positive entries.
        fn objectness_score(
            &self,
            prediction: &YoloPrediction,
            target: &Tensor,
            masks: &TargetMasks,
        ) -> Result<Tensor> {
            let ones = masks.objectness_pos.ones_like();

            let score = match self.objectness_target {
                ObjectnessTarget::Binary => ones,
                ObjectnessTarget::IoU => {
                    let bbox = prediction
                        .bbox()
                        .as_ref()
                        .ok_or_else(|| format_err!("decoded boxes are not available"))?;

                    tch::no_grad(|| -> Result<_> {
                        let pred_boxes = XyxyTensor::from_tensor(bbox)?;
                        let target_boxes = XyxyTensor::from_tensor(&target.narrow(
                            -1,
                            BBOX_CHANNELS.start as i64,
                            BBOX_CHANNELS.len() as i64,
                        ))?;
                        let iou = pred_boxes.iou_with(&target_boxes).squeeze_dim(-1);
                        Ok(iou.where_self(&masks.objectness_pos.gt(0.0), &ones))
                    })?
                    .detach()
                }
            };

            Ok(score)
        }

        fn classification_loss(
            &self,
            prediction: &YoloPrediction,
            target: &Tensor,
            masks: &TargetMasks,
        ) -> Result<Tensor> {
            let is_weighted = masks.weighted.gt(0.0);
            let class_id = target
                .i((.., .., CLASS_CHANNEL as i64))
                .to_kind(Kind::Int64)
                .where_self(&is_weighted, &Tensor::zeros(&[], (Kind::Int64, target.device())));

            if class_id.numel() > 0 {
                let max_class_id = class_id.max().int64_value(&[]);
                ensure!(
                    max_class_id < self.num_classes as i64,
                    "class id {} is out of range for {} classes",
                    max_class_id,
                    self.num_classes
                );
            }

            let log_prob = prediction.class().log_softmax(-1, Kind::Float);
            let cross_entropy = -log_prob
                .gather(-1, &class_id.unsqueeze(-1), false)
                .squeeze_dim(-1);

            Ok((cross_entropy * &masks.weighted).sum_per_sample_mean())
        }

        fn box_loss(
            &self,
            prediction: &YoloPrediction,
            target: &Tensor,
            masks: &TargetMasks,
        ) -> Result<Tensor> {
            let box_weight = &masks.scale_weight * &masks.weighted;

            let loss = match self.box_loss_kind {
                BoxLossKind::Decoupled => {
                    let target_txtytwth = target.narrow(
                        -1,
                        TXTYTWTH_CHANNELS.start as i64,
                        TXTYTWTH_CHANNELS.len() as i64,
                    );
                    let pred_txtytwth = prediction.txtytwth();

                    let txty_loss = pred_txtytwth
                        .narrow(-1, 0, 2)
                        .binary_cross_entropy_with_logits::<Tensor>(
                            &target_txtytwth.narrow(-1, 0, 2),
                            None,
                            None,
                            Reduction::None,
                        )
                        .sum_dim_intlist(&[-1], false, Kind::Float);
                    let twth_loss = (pred_txtytwth.narrow(-1, 2, 2)
                        - target_txtytwth.narrow(-1, 2, 2))
                    .square()
                    .sum_dim_intlist(&[-1], false, Kind::Float);

                    (txty_loss * &box_weight).sum_per_sample_mean()
                        + (twth_loss * &box_weight).sum_per_sample_mean()
                }
                BoxLossKind::IoU | BoxLossKind::DIoU | BoxLossKind::CIoU => {
                    let bbox = prediction
                        .bbox()
                        .as_ref()
                        .ok_or_else(|| format_err!("decoded boxes are not available"))?;

                    // gather positive entries only
                    let is_weighted = masks.weighted.gt(0.0);
                    let box_mask = is_weighted.unsqueeze(-1);
                    let pred_boxes =
                        XyxyTensor::from_tensor(&bbox.masked_select(&box_mask).view([-1, 4]))?;
                    let target_boxes = XyxyTensor::from_tensor(
                        &target
                            .narrow(-1, BBOX_CHANNELS.start as i64, BBOX_CHANNELS.len() as i64)
                            .masked_select(&box_mask)
                            .view([-1, 4]),
                    )?;
                    let weights = masks.scale_weight.masked_select(&is_weighted);

                    let score = match self.box_loss_kind {
                        BoxLossKind::IoU => pred_boxes.iou_with(&target_boxes),
                        BoxLossKind::DIoU => pred_boxes.diou_with(&target_boxes),
                        BoxLossKind::CIoU => pred_boxes.ciou_with(&target_boxes),
                        BoxLossKind::Decoupled => unreachable!(),
                    };

                    let loss_sum = ((1.0_f64 - &score.view([-1])) * weights).sum(Kind::Float);
                    if masks.batch_size > 0 {
                        loss_sum / masks.batch_size as f64
                    } else {
                        loss_sum
                    }
                }
            };

            Ok(loss)
        }
    }

    /// Float masks in shape `[batch, entries]` derived from a target tensor.
    struct TargetMasks {
        batch_size: i64,
        /// Entries with objectness 1.
        objectness_pos: Tensor,
        /// Entries with objectness 0.
        objectness_neg: Tensor,
        /// Entries with a positive scale weight.
        weighted: Tensor,
        scale_weight: Tensor,
    }

    impl TargetMasks {
        fn new(target: &Tensor) -> Self {
            let batch_size = target.size()[0];
            let objectness = target.i((.., .., OBJECTNESS_CHANNEL as i64));
            let scale_weight = target.i((.., .., SCALE_WEIGHT_CHANNEL as i64));

            Self {
                batch_size,
                objectness_pos: objectness.eq(1.0).to_kind(Kind::Float),
                objectness_neg: objectness.eq(0.0).to_kind(Kind::Float),
                weighted: scale_weight.gt(0.0).to_kind(Kind::Float),
                scale_weight,
            }
        }
    }
}

mod yolo_loss_output {
    use super::*;

    /// The scalar losses of a batch.
    #[derive(Debug, TensorLike)]
    pub struct YoloLossOutput {
        pub objectness_loss: Tensor,
        pub classification_loss: Tensor,
        pub box_loss: Tensor,
        pub total_loss: Tensor,
    }

    impl YoloLossOutput {
        pub fn to_values(&self) -> YoloLossValues {
            YoloLossValues {
                objectness_loss: self.objectness_loss.double_value(&[]),
                classification_loss: self.classification_loss.double_value(&[]),
                box_loss: self.box_loss.double_value(&[]),
                total_loss: self.total_loss.double_value(&[]),
            }
        }
    }

    /// Plain float copies of [YoloLossOutput] for logging.
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct YoloLossValues {
        pub objectness_loss: f64,
        pub classification_loss: f64,
        pub box_loss: f64,
        pub total_loss: f64,
    }
}

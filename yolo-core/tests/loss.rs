use anyhow::Result;
use approx::assert_abs_diff_eq;
use std::f64::consts::LN_2;
use tch::{Device, Kind, Tensor};
use yolo_core::loss::{
    BoxLossKind, ObjectnessLossKind, ObjectnessTarget, YoloLoss, YoloLossInit, YoloPrediction,
    YoloPredictionUnchecked,
};

const NUM_CLASSES: usize = 4;

/// One ignored, one negative and one positive entry.
fn target() -> Tensor {
    #[rustfmt::skip]
    let rows: &[f32] = &[
        -1.0, 0.0, 0.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0,
        0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        1.0, 2.0, 0.7, 0.3, 0.1, -0.2, 1.5, 0.3, 0.2, 0.7, 0.6,
    ];
    Tensor::of_slice(rows).view([1, 3, 11])
}

fn prediction(objectness: &[f32]) -> Result<YoloPrediction> {
    let num_entries = objectness.len() as i64;
    let prediction = YoloPredictionUnchecked {
        objectness: Tensor::of_slice(objectness).view([1, num_entries, 1]),
        class: Tensor::zeros(
            &[1, num_entries, NUM_CLASSES as i64],
            (Kind::Float, Device::Cpu),
        ),
        txtytwth: Tensor::zeros(&[1, num_entries, 4], (Kind::Float, Device::Cpu)),
    }
    .try_into()?;
    Ok(prediction)
}

fn yolo_loss(
    objectness_loss_kind: ObjectnessLossKind,
    objectness_target: ObjectnessTarget,
    box_loss_kind: BoxLossKind,
) -> Result<YoloLoss> {
    YoloLossInit {
        objectness_loss_kind: Some(objectness_loss_kind),
        objectness_target: Some(objectness_target),
        box_loss_kind: Some(box_loss_kind),
        ..YoloLossInit::new(NUM_CLASSES)
    }
    .build()
}

/// Decoded boxes with NaN at non-positive entries.
fn boxes(positive: [f32; 4], requires_grad: bool) -> Tensor {
    let nan = f32::NAN;
    #[rustfmt::skip]
    let values = [
        nan, nan, nan, nan,
        nan, nan, nan, nan,
        positive[0], positive[1], positive[2], positive[3],
    ];
    Tensor::of_slice(&values)
        .view([1, 3, 4])
        .set_requires_grad(requires_grad)
}

#[test]
fn decoupled_loss_values() -> Result<()> {
    let loss_fn = yolo_loss(
        ObjectnessLossKind::Mse,
        ObjectnessTarget::Binary,
        BoxLossKind::Decoupled,
    )?;
    let values = loss_fn
        .forward(&prediction(&[0.0, 0.0, 0.0])?, &target())?
        .to_values();

    // p = 0.5: 5 * (0.5 - 1)^2 + 0.5^2
    assert_abs_diff_eq!(values.objectness_loss, 1.5, epsilon = 1e-5);
    // uniform logits over 4 classes
    assert_abs_diff_eq!(values.classification_loss, 4f64.ln(), epsilon = 1e-5);
    // BCE at zero logits is ln 2 for any target, then weighted by 1.5
    let expect_box = 1.5 * (2.0 * LN_2 + 0.1f64.powi(2) + 0.2f64.powi(2));
    assert_abs_diff_eq!(values.box_loss, expect_box, epsilon = 1e-4);
    assert_abs_diff_eq!(
        values.total_loss,
        1.5 + 4f64.ln() + expect_box,
        epsilon = 1e-4
    );
    Ok(())
}

#[test]
fn bce_objectness_loss_values() -> Result<()> {
    let loss_fn = yolo_loss(
        ObjectnessLossKind::Bce,
        ObjectnessTarget::Binary,
        BoxLossKind::Decoupled,
    )?;
    let values = loss_fn
        .forward(&prediction(&[0.0, 0.0, 0.0])?, &target())?
        .to_values();
    assert_abs_diff_eq!(values.objectness_loss, 2.0 * LN_2, epsilon = 1e-5);
    Ok(())
}

#[test]
fn ignored_entries_do_not_affect_objectness() -> Result<()> {
    for kind in [ObjectnessLossKind::Bce, ObjectnessLossKind::Mse] {
        let loss_fn = yolo_loss(kind, ObjectnessTarget::Binary, BoxLossKind::Decoupled)?;
        let lhs = loss_fn.forward(&prediction(&[0.0, 0.3, -0.2])?, &target())?;
        let rhs = loss_fn.forward(&prediction(&[8.0, 0.3, -0.2])?, &target())?;
        assert_abs_diff_eq!(
            lhs.to_values().objectness_loss,
            rhs.to_values().objectness_loss,
            epsilon = 1e-6
        );
    }
    Ok(())
}

#[test]
fn perfect_objectness_vanishes() -> Result<()> {
    let loss_fn = yolo_loss(
        ObjectnessLossKind::Mse,
        ObjectnessTarget::Binary,
        BoxLossKind::Decoupled,
    )?;
    let values = loss_fn
        .forward(&prediction(&[0.0, -30.0, 30.0])?, &target())?
        .to_values();
    assert_abs_diff_eq!(values.objectness_loss, 0.0, epsilon = 1e-6);
    Ok(())
}

#[test]
fn losses_are_averaged_over_batch() -> Result<()> {
    let loss_fn = yolo_loss(
        ObjectnessLossKind::Mse,
        ObjectnessTarget::Binary,
        BoxLossKind::Decoupled,
    )?;

    let empty = Tensor::zeros(&[1, 3, 11], (Kind::Float, Device::Cpu));
    let target = Tensor::cat(&[target(), empty], 0);
    let prediction: YoloPrediction = YoloPredictionUnchecked {
        objectness: Tensor::of_slice(&[0f32, 0.0, 0.0, -30.0, -30.0, -30.0]).view([2, 3, 1]),
        class: Tensor::zeros(&[2, 3, NUM_CLASSES as i64], (Kind::Float, Device::Cpu)),
        txtytwth: Tensor::zeros(&[2, 3, 4], (Kind::Float, Device::Cpu)),
    }
    .try_into()?;

    let values = loss_fn.forward(&prediction, &target)?.to_values();
    assert_abs_diff_eq!(values.objectness_loss, 1.5 / 2.0, epsilon = 1e-5);
    assert_abs_diff_eq!(values.classification_loss, 4f64.ln() / 2.0, epsilon = 1e-5);
    Ok(())
}

#[test]
fn overlap_box_losses() -> Result<()> {
    // the ground truth is [0.3, 0.2, 0.7, 0.6]
    let shifted = [0.2, 0.2, 0.6, 0.6];
    // intersection 0.12, union 0.2
    let iou = 0.6;
    // center distance 0.1, closure 0.5 x 0.4
    let diou = iou - 0.01 / 0.41;

    for (kind, score) in [(BoxLossKind::IoU, iou), (BoxLossKind::DIoU, diou)] {
        let loss_fn = yolo_loss(ObjectnessLossKind::Mse, ObjectnessTarget::Binary, kind)?;
        let prediction = prediction(&[0.0, 0.0, 0.0])?.with_bbox(boxes(shifted, false))?;
        let values = loss_fn.forward(&prediction, &target())?.to_values();
        assert_abs_diff_eq!(values.box_loss, (1.0 - score) * 1.5, epsilon = 1e-5);
    }

    // equal aspect ratios leave CIoU equal to DIoU
    let loss_fn = yolo_loss(
        ObjectnessLossKind::Mse,
        ObjectnessTarget::Binary,
        BoxLossKind::CIoU,
    )?;
    let prediction = prediction(&[0.0, 0.0, 0.0])?.with_bbox(boxes(shifted, false))?;
    let values = loss_fn.forward(&prediction, &target())?.to_values();
    assert_abs_diff_eq!(values.box_loss, (1.0 - diou) * 1.5, epsilon = 1e-5);

    Ok(())
}

#[test]
fn ciou_loss_skips_non_positive_entries() -> Result<()> {
    let loss_fn = yolo_loss(
        ObjectnessLossKind::Bce,
        ObjectnessTarget::Binary,
        BoxLossKind::CIoU,
    )?;

    let bbox = boxes([0.3, 0.2, 0.7, 0.6], true);
    let prediction = prediction(&[0.0, 0.0, 0.0])?.with_bbox(bbox.shallow_clone())?;
    let output = loss_fn.forward(&prediction, &target())?;

    let values = output.to_values();
    assert!(values.box_loss.is_finite());
    assert_abs_diff_eq!(values.box_loss, 0.0, epsilon = 1e-5);

    output.box_loss.backward();
    let grad = bbox.grad();
    assert!(bool::from(grad.isfinite().all()));
    Ok(())
}

#[test]
fn iou_objectness_target() -> Result<()> {
    let loss_fn = yolo_loss(
        ObjectnessLossKind::Mse,
        ObjectnessTarget::IoU,
        BoxLossKind::Decoupled,
    )?;
    let prediction =
        prediction(&[0.0, 0.0, 0.0])?.with_bbox(boxes([0.2, 0.2, 0.6, 0.6], false))?;
    let values = loss_fn.forward(&prediction, &target())?.to_values();

    // 5 * (0.5 - 0.6)^2 + 0.5^2
    assert_abs_diff_eq!(values.objectness_loss, 0.3, epsilon = 1e-5);
    Ok(())
}

#[test]
fn reject_inconsistent_inputs() -> Result<()> {
    let loss_fn = yolo_loss(
        ObjectnessLossKind::Mse,
        ObjectnessTarget::Binary,
        BoxLossKind::Decoupled,
    )?;

    // entry count mismatch
    assert!(loss_fn
        .forward(&prediction(&[0.0, 0.0, 0.0, 0.0])?, &target())
        .is_err());

    // channel count mismatch
    let narrow_target = target().narrow(-1, 0, 10);
    assert!(loss_fn
        .forward(&prediction(&[0.0, 0.0, 0.0])?, &narrow_target)
        .is_err());

    // class id out of range
    let bad_class = target();
    let _ = bad_class.get(0).get(2).get(1).fill_(7.0);
    assert!(loss_fn
        .forward(&prediction(&[0.0, 0.0, 0.0])?, &bad_class)
        .is_err());

    // overlap losses need decoded boxes
    let ciou_fn = yolo_loss(
        ObjectnessLossKind::Mse,
        ObjectnessTarget::Binary,
        BoxLossKind::CIoU,
    )?;
    assert!(ciou_fn
        .forward(&prediction(&[0.0, 0.0, 0.0])?, &target())
        .is_err());

    assert!(YoloLossInit::new(0).build().is_err());
    Ok(())
}

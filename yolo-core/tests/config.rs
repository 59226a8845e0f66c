use anyhow::Result;
use std::path::{Path, PathBuf};
use yolo_core::{
    config::Config,
    loss::{BoxLossKind, ObjectnessLossKind, ObjectnessTarget},
};

lazy_static::lazy_static! {
    static ref CONFIG_DIR: PathBuf = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("cfg");
}

#[test]
fn generated_anchor_config() -> Result<()> {
    let config = Config::open(CONFIG_DIR.join("yolo-ciou.json5"))?;

    let anchors = config.anchor_templates()?;
    assert_eq!(anchors.strides(), &vec![8, 16, 32]);
    assert_eq!(anchors.anchors_per_scale(), 3);
    assert_eq!(anchors.num_anchors(), 9);
    // (416 / 32)^2 * 0.25 = 42.25 with aspect 0.5
    assert_eq!(anchors.anchors()[8].wh(), [6.0, 3.0]);

    let encoder = config.target_encoder()?;
    assert_eq!(*encoder.ignore_thresh(), 0.5);

    let loss = config.yolo_loss()?;
    assert_eq!(*loss.num_classes(), 80);
    assert_eq!(*loss.objectness_loss_kind(), ObjectnessLossKind::Bce);
    assert_eq!(*loss.objectness_target(), ObjectnessTarget::IoU);
    assert_eq!(*loss.box_loss_kind(), BoxLossKind::CIoU);

    Ok(())
}

#[test]
fn explicit_anchor_config_with_default_loss() -> Result<()> {
    let config = Config::open(CONFIG_DIR.join("yolo-decoupled.json5"))?;

    let anchors = config.anchor_templates()?;
    assert_eq!(anchors.num_anchors(), 5);
    assert_eq!(anchors.anchors_per_scale(), 5);
    assert_eq!(anchors.anchors()[1].wh(), [91.52, 149.12]);

    let loss = config.yolo_loss()?;
    assert_eq!(*loss.objectness_loss_kind(), ObjectnessLossKind::Mse);
    assert_eq!(*loss.objectness_target(), ObjectnessTarget::Binary);
    assert_eq!(*loss.box_loss_kind(), BoxLossKind::Decoupled);

    Ok(())
}

#[test]
fn missing_config_file() {
    assert!(Config::open(CONFIG_DIR.join("no-such-file.json5")).is_err());
}

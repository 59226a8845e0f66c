//! Configuration format.

use crate::{
    anchor::AnchorTemplates,
    common::*,
    loss::{BoxLossKind, ObjectnessLossKind, ObjectnessTarget, YoloLoss, YoloLossInit},
    target::{TargetEncoder, TargetEncoderInit},
};
use bbox::WH;

pub use anchor::*;
pub use assignment::*;
pub use loss::*;

/// The main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub anchors: AnchorConfig,
    pub assignment: AssignmentConfig,
    pub loss: LossConfig,
}

impl Config {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = json5::from_str(&text)
            .with_context(|| format!("unable to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn anchor_templates(&self) -> Result<AnchorTemplates> {
        self.anchors.anchor_templates()
    }

    pub fn target_encoder(&self) -> Result<TargetEncoder> {
        TargetEncoderInit {
            anchors: self.anchor_templates()?,
            ignore_thresh: self.assignment.ignore_thresh.raw(),
        }
        .build()
    }

    pub fn yolo_loss(&self) -> Result<YoloLoss> {
        self.loss.yolo_loss_init().build()
    }
}

mod anchor {
    use super::*;

    /// Anchor templates and the input resolution they are derived for.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct AnchorConfig {
        /// The input image size in `[height, width]`.
        pub input_size: [usize; 2],
        /// The down-sampling factor of each scale level.
        pub strides: Vec<usize>,
        pub kind: AnchorKind,
    }

    impl AnchorConfig {
        pub fn anchor_templates(&self) -> Result<AnchorTemplates> {
            let Self {
                input_size,
                ref strides,
                ref kind,
            } = *self;

            match kind {
                AnchorKind::Explicit { sizes } => {
                    let anchors: Vec<_> = sizes
                        .iter()
                        .map(|&[w, h]| WH::try_from_wh([w.raw(), h.raw()]))
                        .collect::<Result<_>>()?;
                    AnchorTemplates::new(strides.clone(), anchors)
                }
                AnchorKind::Generated { scales, aspects } => {
                    let scales: Vec<_> = scales.iter().map(|scale| scale.raw()).collect();
                    let aspects: Vec<Vec<_>> = aspects
                        .iter()
                        .map(|aspects| aspects.iter().map(|aspect| aspect.raw()).collect())
                        .collect();
                    AnchorTemplates::generate(input_size, strides.clone(), &scales, &aspects)
                }
            }
        }
    }

    /// The source of anchor sizes.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(tag = "type")]
    pub enum AnchorKind {
        /// Flat `[w, h]` pixel sizes, grouped per stride in order.
        Explicit { sizes: Vec<[R64; 2]> },
        /// Area ratios and per-ratio aspect lists applied to every stride.
        Generated {
            scales: Vec<R64>,
            aspects: Vec<Vec<R64>>,
        },
    }
}

mod assignment {
    use super::*;

    /// Ground truth assignment options.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct AssignmentConfig {
        pub ignore_thresh: R64,
    }
}

mod loss {
    use super::*;

    /// The loss function configuration.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct LossConfig {
        pub num_classes: usize,
        /// The choice of objectness loss function.
        pub objectness_loss_fn: Option<ObjectnessLossKind>,
        /// The objectness value positive anchors are trained towards.
        pub objectness_target: Option<ObjectnessTarget>,
        /// The choice of box regression loss.
        pub box_loss_fn: Option<BoxLossKind>,
    }

    impl LossConfig {
        pub fn yolo_loss_init(&self) -> YoloLossInit {
            let Self {
                num_classes,
                objectness_loss_fn,
                objectness_target,
                box_loss_fn,
            } = *self;

            YoloLossInit {
                objectness_loss_kind: objectness_loss_fn,
                objectness_target,
                box_loss_kind: box_loss_fn,
                ..YoloLossInit::new(num_classes)
            }
        }
    }
}

use crate::common::*;
use bbox::{RectNum, XYXY};
use std::ops::Range;

/// The number of channels per anchor cell in the serialized target.
pub const NUM_CHANNELS: usize = 11;
/// The objectness state in `{-1, 0, 1}`.
pub const OBJECTNESS_CHANNEL: usize = 0;
pub const CLASS_CHANNEL: usize = 1;
/// The `tx, ty, tw, th` regression targets.
pub const TXTYTWTH_CHANNELS: Range<usize> = 2..6;
pub const SCALE_WEIGHT_CHANNEL: usize = 6;
/// The normalized `xmin, ymin, xmax, ymax` ground truth box.
pub const BBOX_CHANNELS: Range<usize> = 7..11;

/// The training role of an anchor cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Objectness {
    /// No object. Contributes to the negative objectness loss.
    Negative,
    /// The anchor owns a ground truth.
    Positive { scale_weight: f64 },
    /// Overlaps a ground truth well but lost to a better anchor.
    /// Excluded from the objectness loss.
    Ignored,
}

impl Objectness {
    pub fn is_positive(&self) -> bool {
        matches!(self, Self::Positive { .. })
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored)
    }

    /// The `(objectness, scale_weight)` channel values.
    pub fn to_values(&self) -> (f32, f32) {
        match *self {
            Self::Negative => (0.0, 0.0),
            Self::Positive { scale_weight } => (1.0, scale_weight as f32),
            Self::Ignored => (-1.0, -1.0),
        }
    }
}

impl Default for Objectness {
    fn default() -> Self {
        Self::Negative
    }
}

/// The regression and classification payload of a matched anchor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxEncoding {
    pub class_id: usize,
    pub tx: f64,
    pub ty: f64,
    pub tw: f64,
    pub th: f64,
    /// The normalized ground truth box.
    pub bbox: XYXY<f64>,
}

/// The assignment state of one anchor cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnchorTarget {
    pub objectness: Objectness,
    pub encoding: Option<BoxEncoding>,
}

impl AnchorTarget {
    pub fn positive(scale_weight: f64, encoding: BoxEncoding) -> Self {
        Self {
            objectness: Objectness::Positive { scale_weight },
            encoding: Some(encoding),
        }
    }

    /// Mark the cell ignored.
    ///
    /// The payload written by an earlier positive is kept.
    pub fn mark_ignored(&mut self) {
        self.objectness = Objectness::Ignored;
    }

    /// Serialize into the channel layout
    /// `[objectness, class_id, tx, ty, tw, th, scale_weight, xmin, ymin, xmax, ymax]`.
    pub fn to_channels(&self) -> [f32; NUM_CHANNELS] {
        let mut channels = [0f32; NUM_CHANNELS];

        let (objectness, scale_weight) = self.objectness.to_values();
        channels[OBJECTNESS_CHANNEL] = objectness;
        channels[SCALE_WEIGHT_CHANNEL] = scale_weight;

        if let Some(encoding) = &self.encoding {
            let BoxEncoding {
                class_id,
                tx,
                ty,
                tw,
                th,
                bbox,
            } = *encoding;

            channels[CLASS_CHANNEL] = class_id as f32;
            izip!(&mut channels[TXTYTWTH_CHANNELS], [tx, ty, tw, th])
                .for_each(|(channel, value)| *channel = value as f32);
            izip!(&mut channels[BBOX_CHANNELS], bbox.xyxy())
                .for_each(|(channel, value)| *channel = value as f32);
        }

        channels
    }
}

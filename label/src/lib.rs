//! Ground truth labels.

use anyhow::{ensure, format_err, Error, Result};
use bbox::{CxCyWH, Rect, RectNum, XYXY};
use noisy_float::prelude::*;
use num_traits::Float;

/// A box with a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label<R, C>
where
    R: Rect,
{
    pub rect: R,
    pub class: C,
}

/// A ground truth in normalized corner coordinates.
pub type RatioLabel = Label<XYXY<R64>, usize>;

impl<T, C> Label<XYXY<T>, C>
where
    T: Float,
{
    /// Convert the normalized box to a center box in pixels.
    ///
    /// `image_size` is `[height, width]`.
    pub fn to_pixel_cxcywh(&self, image_size: [T; 2]) -> CxCyWH<T> {
        let [image_h, image_w] = image_size;
        self.rect.scale_xy(image_w, image_h).to_cxcywh()
    }
}

impl RatioLabel {
    /// Build a label from normalized corner coordinates.
    ///
    /// Every coordinate must be finite and lie within `[0, 1]`.
    pub fn new(xyxy: [f64; 4], class: usize) -> Result<Self> {
        let [xmin, ymin, xmax, ymax] = xyxy;
        let to_r64 = |value: f64| -> Result<R64> {
            let value =
                R64::try_new(value).ok_or_else(|| format_err!("non-finite coordinate"))?;
            ensure!(
                (0.0..=1.0).contains(&value.raw()),
                "normalized coordinate must be within [0, 1], but get {}",
                value
            );
            Ok(value)
        };
        let rect = XYXY::try_from_xyxy([to_r64(xmin)?, to_r64(ymin)?, to_r64(xmax)?, to_r64(ymax)?])?;
        Ok(Self { rect, class })
    }

    /// The box as plain floats.
    pub fn to_f64_rect(&self) -> XYXY<f64> {
        let [xmin, ymin, xmax, ymax] = self.rect.xyxy();
        XYXY::from_xyxy([xmin.raw(), ymin.raw(), xmax.raw(), ymax.raw()])
    }
}

/// Parse the `[xmin, ymin, xmax, ymax, class_id]` row format.
impl TryFrom<[f64; 5]> for RatioLabel {
    type Error = Error;

    fn try_from(from: [f64; 5]) -> Result<Self, Self::Error> {
        let [xmin, ymin, xmax, ymax, class] = from;
        ensure!(
            class >= 0.0 && class.fract() == 0.0,
            "class id must be a non-negative integer, but get {}",
            class
        );
        Self::new([xmin, ymin, xmax, ymax], class as usize)
    }
}

impl TryFrom<&[f64]> for RatioLabel {
    type Error = Error;

    fn try_from(from: &[f64]) -> Result<Self, Self::Error> {
        let row: [f64; 5] = from
            .try_into()
            .map_err(|_| format_err!("expect 5 values per label, but get {}", from.len()))?;
        row.try_into()
    }
}

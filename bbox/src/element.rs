use crate::common::*;

/// Floating point types usable as box parameters.
///
/// The constants are the additive epsilons shared by the whole IoU family.
pub trait Element: Float {
    /// Added to IoU union areas and DIoU diagonal lengths.
    const IOU_EPSILON: Self;
    /// Added to box heights and to the aspect penalty in CIoU.
    const ASPECT_EPSILON: Self;
    /// The `4/π²` factor of the CIoU aspect penalty.
    const ASPECT_PENALTY_SCALE: Self;
}

impl Element for f32 {
    const IOU_EPSILON: Self = 1e-20;
    const ASPECT_EPSILON: Self = 1e-15;
    const ASPECT_PENALTY_SCALE: Self = 4.0 / (std::f32::consts::PI * std::f32::consts::PI);
}

impl Element for f64 {
    const IOU_EPSILON: Self = 1e-20;
    const ASPECT_EPSILON: Self = 1e-15;
    const ASPECT_PENALTY_SCALE: Self = 4.0 / (std::f64::consts::PI * std::f64::consts::PI);
}

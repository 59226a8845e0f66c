use crate::common::*;

/// The objectness loss function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectnessLossKind {
    /// Binary cross entropy on the sigmoid probability.
    Bce,
    /// Squared error on the sigmoid probability.
    Mse,
}

impl ObjectnessLossKind {
    /// The `(positive, negative)` term weights.
    pub fn weights(&self) -> (f64, f64) {
        match self {
            Self::Bce => (1.0, 1.0),
            Self::Mse => (5.0, 1.0),
        }
    }
}

/// The objectness value that positive anchors are trained towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectnessTarget {
    /// Always 1.
    Binary,
    /// The IoU between the decoded prediction and its ground truth.
    IoU,
}

/// The box regression loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoxLossKind {
    /// BCE on `tx, ty` plus squared error on `tw, th`.
    Decoupled,
    IoU,
    DIoU,
    CIoU,
}

impl BoxLossKind {
    /// Whether the loss works on decoded boxes.
    pub fn requires_boxes(&self) -> bool {
        !matches!(self, Self::Decoupled)
    }
}

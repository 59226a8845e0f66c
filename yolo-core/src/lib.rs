//! Anchor assignment and loss computation for multi-scale YOLO detectors.

mod common;
pub mod anchor;
pub mod config;
pub mod decode;
pub mod loss;
pub mod target;

//! Safe bounding box types and overlap metrics.

mod common;

pub use element::*;
pub mod element;

pub use rect::*;
pub mod rect;

pub use xyxy::*;
pub mod xyxy;

pub use cxcywh::*;
pub mod cxcywh;

pub use wh::*;
pub mod wh;

pub use shape::*;
pub mod shape;

pub mod prelude {
    pub use crate::rect::{Rect, RectFloat, RectNum};
}

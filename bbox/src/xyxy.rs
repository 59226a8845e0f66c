use super::{CxCyWH, Rect};
use crate::common::*;

/// Bounding box in corner format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XYXY<T> {
    pub(crate) xmin: T,
    pub(crate) ymin: T,
    pub(crate) xmax: T,
    pub(crate) ymax: T,
}

impl<T> XYXY<T>
where
    T: Copy + Num,
{
    /// Multiply x coordinates by `scale_x` and y coordinates by `scale_y`.
    ///
    /// It converts normalized boxes to pixel boxes and vice versa.
    pub fn scale_xy(&self, scale_x: T, scale_y: T) -> Self {
        XYXY {
            xmin: self.xmin * scale_x,
            ymin: self.ymin * scale_y,
            xmax: self.xmax * scale_x,
            ymax: self.ymax * scale_y,
        }
    }
}

impl<T> Rect for XYXY<T>
where
    T: Copy + Num + PartialOrd,
{
    type Type = T;

    fn xmin(&self) -> Self::Type {
        self.xmin
    }

    fn ymin(&self) -> Self::Type {
        self.ymin
    }

    fn xmax(&self) -> Self::Type {
        self.xmax
    }

    fn ymax(&self) -> Self::Type {
        self.ymax
    }

    fn cx(&self) -> Self::Type {
        let two = T::one() + T::one();
        (self.xmin + self.xmax) / two
    }

    fn cy(&self) -> Self::Type {
        let two = T::one() + T::one();
        (self.ymin + self.ymax) / two
    }

    fn w(&self) -> Self::Type {
        self.xmax - self.xmin
    }

    fn h(&self) -> Self::Type {
        self.ymax - self.ymin
    }

    fn try_from_xyxy(xyxy: [Self::Type; 4]) -> Result<Self> {
        let [xmin, ymin, xmax, ymax] = xyxy;
        ensure!(
            xmax >= xmin && ymax >= ymin,
            "xmax >= xmin and ymax >= ymin must hold"
        );
        Ok(Self {
            xmin,
            ymin,
            xmax,
            ymax,
        })
    }

    fn try_from_cxcywh(cxcywh: [Self::Type; 4]) -> Result<Self> {
        let [cx, cy, w, h] = cxcywh;
        let zero = T::zero();
        ensure!(w >= zero && h >= zero, "w and h must be non-negative");

        let two = T::one() + T::one();
        Ok(Self {
            xmin: cx - w / two,
            ymin: cy - h / two,
            xmax: cx + w / two,
            ymax: cy + h / two,
        })
    }
}

impl<T> From<CxCyWH<T>> for XYXY<T>
where
    T: Copy + Num,
{
    fn from(from: CxCyWH<T>) -> Self {
        Self::from(&from)
    }
}

impl<T> From<&CxCyWH<T>> for XYXY<T>
where
    T: Copy + Num,
{
    fn from(from: &CxCyWH<T>) -> Self {
        let two = T::one() + T::one();
        let CxCyWH { cx, cy, w, h } = *from;
        Self {
            xmin: cx - w / two,
            ymin: cy - h / two,
            xmax: cx + w / two,
            ymax: cy + h / two,
        }
    }
}

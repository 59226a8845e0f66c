use super::{CxCyWH, XYXY};
use crate::{common::*, element::Element};

/// The generic rectangle.
///
/// The x axis points right and the y axis points down, so `xmin`/`ymin`
/// is the top-left corner.
pub trait Rect {
    type Type;

    fn xmin(&self) -> Self::Type;
    fn ymin(&self) -> Self::Type;
    fn xmax(&self) -> Self::Type;
    fn ymax(&self) -> Self::Type;
    fn cx(&self) -> Self::Type;
    fn cy(&self) -> Self::Type;
    fn w(&self) -> Self::Type;
    fn h(&self) -> Self::Type;

    fn try_from_xyxy(xyxy: [Self::Type; 4]) -> Result<Self>
    where
        Self: Sized;

    fn try_from_cxcywh(cxcywh: [Self::Type; 4]) -> Result<Self>
    where
        Self: Sized;
}

pub trait RectNum: Rect
where
    Self::Type: Num + PartialOrd,
{
    fn from_xyxy(xyxy: [Self::Type; 4]) -> Self
    where
        Self: Sized,
    {
        Self::try_from_xyxy(xyxy).unwrap()
    }

    fn from_cxcywh(cxcywh: [Self::Type; 4]) -> Self
    where
        Self: Sized,
    {
        Self::try_from_cxcywh(cxcywh).unwrap()
    }

    fn xyxy(&self) -> [Self::Type; 4] {
        [self.xmin(), self.ymin(), self.xmax(), self.ymax()]
    }

    fn cxcywh(&self) -> [Self::Type; 4] {
        [self.cx(), self.cy(), self.w(), self.h()]
    }

    fn wh(&self) -> [Self::Type; 2] {
        [self.w(), self.h()]
    }

    fn to_xyxy(&self) -> XYXY<Self::Type> {
        XYXY {
            xmin: self.xmin(),
            ymin: self.ymin(),
            xmax: self.xmax(),
            ymax: self.ymax(),
        }
    }

    fn to_cxcywh(&self) -> CxCyWH<Self::Type> {
        CxCyWH {
            cx: self.cx(),
            cy: self.cy(),
            w: self.w(),
            h: self.h(),
        }
    }

    fn area(&self) -> <Self::Type as Mul<Self::Type>>::Output
    where
        Self::Type: Mul<Self::Type>,
    {
        self.w() * self.h()
    }
}

/// Overlap metrics between rectangles.
///
/// None of the metrics validate their inputs. Boxes with negative extents
/// produce meaningless scores instead of errors.
pub trait RectFloat: RectNum
where
    Self::Type: Element,
{
    /// Compute the smallest box enclosing both boxes.
    fn closure_with<R>(&self, other: &R) -> XYXY<Self::Type>
    where
        R: Rect<Type = Self::Type>,
    {
        XYXY {
            xmin: self.xmin().min(other.xmin()),
            ymin: self.ymin().min(other.ymin()),
            xmax: self.xmax().max(other.xmax()),
            ymax: self.ymax().max(other.ymax()),
        }
    }

    fn intersect_with<R>(&self, other: &R) -> Option<XYXY<Self::Type>>
    where
        R: Rect<Type = Self::Type>,
    {
        let xmin = self.xmin().max(other.xmin());
        let ymin = self.ymin().max(other.ymin());
        let xmax = self.xmax().min(other.xmax());
        let ymax = self.ymax().min(other.ymax());
        (xmax > xmin && ymax > ymin).then(|| XYXY {
            xmin,
            ymin,
            xmax,
            ymax,
        })
    }

    fn intersection_area_with<R>(&self, other: &R) -> Self::Type
    where
        R: Rect<Type = Self::Type>,
    {
        self.intersect_with(other)
            .map(|rect| rect.area())
            .unwrap_or_else(Self::Type::zero)
    }

    /// Position-sensitive IoU.
    fn iou_with<R>(&self, other: &R) -> Self::Type
    where
        R: Rect<Type = Self::Type>,
    {
        let inter_area = self.intersection_area_with(other);
        let union_area = self.area() + other.area() - inter_area + Self::Type::IOU_EPSILON;
        inter_area / union_area
    }

    /// Squared distance between the box centers.
    fn center_distance_square_to<R>(&self, other: &R) -> Self::Type
    where
        R: Rect<Type = Self::Type>,
    {
        let dx = other.cx() - self.cx();
        let dy = other.cy() - self.cy();
        dx * dx + dy * dy
    }

    fn diou_with<R>(&self, other: &R) -> Self::Type
    where
        R: Rect<Type = Self::Type>,
    {
        let closure = self.closure_with(other);
        let [diag_w, diag_h] = closure.wh();
        let diagonal_square = diag_w * diag_w + diag_h * diag_h;
        let penalty =
            self.center_distance_square_to(other) / (diagonal_square + Self::Type::IOU_EPSILON);
        self.iou_with(other) - penalty
    }

    /// CIoU score.
    ///
    /// Only the heights are offset before the aspect ratio division.
    fn ciou_with<R>(&self, other: &R) -> Self::Type
    where
        R: Rect<Type = Self::Type>,
    {
        let eps = Self::Type::ASPECT_EPSILON;
        let one = Self::Type::one();

        let iou = self.iou_with(other);
        let diou = self.diou_with(other);

        let lhs_angle = (self.w() / (self.h() + eps)).atan();
        let rhs_angle = (other.w() / (other.h() + eps)).atan();
        let diff = lhs_angle - rhs_angle;
        let v = Self::Type::ASPECT_PENALTY_SCALE * (diff * diff + eps);
        let alpha = v / ((one - iou) + v);

        diou - alpha * v
    }
}

impl<T> RectNum for T
where
    T: Rect,
    T::Type: Num + PartialOrd,
{
}

impl<T> RectFloat for T
where
    T: Rect,
    T::Type: Element,
{
}

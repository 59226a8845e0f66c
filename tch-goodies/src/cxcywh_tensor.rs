use crate::{common::*, xyxy_tensor::XyxyTensor};

/// Checked tensor of batched box parameters in center-size format.
#[derive(Debug, TensorLike, Getters)]
pub struct CxCyWHTensor {
    #[get = "pub"]
    pub(crate) cx: Tensor,
    #[get = "pub"]
    pub(crate) cy: Tensor,
    #[get = "pub"]
    pub(crate) w: Tensor,
    #[get = "pub"]
    pub(crate) h: Tensor,
}

#[derive(Debug, TensorLike)]
pub struct CxCyWHTensorUnchecked {
    pub cx: Tensor,
    pub cy: Tensor,
    pub w: Tensor,
    pub h: Tensor,
}

impl CxCyWHTensor {
    pub fn device(&self) -> Device {
        self.cx.device()
    }

    pub fn to_xyxy(&self) -> XyxyTensor {
        self.into()
    }
}

impl TryFrom<CxCyWHTensorUnchecked> for CxCyWHTensor {
    type Error = Error;

    fn try_from(from: CxCyWHTensorUnchecked) -> Result<Self, Self::Error> {
        let CxCyWHTensorUnchecked { cx, cy, w, h } = from;

        let size = cx.size();
        ensure!(
            size.len() >= 2 && size.last() == Some(&1),
            "expect shape [.., 1], but get {:?}",
            size
        );
        ensure!(
            cy.size() == size && w.size() == size && h.size() == size,
            "size mismatch"
        );
        ensure!(
            hashset! {
                cx.device(),
                cy.device(),
                w.device(),
                h.device(),
            }
            .len()
                == 1,
            "device mismatch"
        );

        Ok(Self { cx, cy, w, h })
    }
}

impl From<&XyxyTensor> for CxCyWHTensor {
    fn from(from: &XyxyTensor) -> Self {
        let XyxyTensor {
            xmin,
            ymin,
            xmax,
            ymax,
        } = from;

        let w = xmax - xmin;
        let h = ymax - ymin;
        let cx = xmin + &w / 2.0;
        let cy = ymin + &h / 2.0;

        Self { cx, cy, w, h }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_to_xyxy() -> Result<()> {
        let column = |value: f32| Tensor::of_slice(&[value]).view([1, 1]);
        let boxes: CxCyWHTensor = CxCyWHTensorUnchecked {
            cx: column(0.5),
            cy: column(0.4),
            w: column(0.2),
            h: column(0.6),
        }
        .try_into()?;

        let xyxy = boxes.to_xyxy().to_tensor();
        let expect = Tensor::of_slice(&[0.4f32, 0.1, 0.6, 0.7]).view([1, 4]);
        assert!((xyxy - expect).abs().max().double_value(&[]) < 1e-6);

        let restored = CxCyWHTensor::from(&boxes.to_xyxy());
        assert!((restored.h() - 0.6).abs().max().double_value(&[]) < 1e-6);
        Ok(())
    }
}

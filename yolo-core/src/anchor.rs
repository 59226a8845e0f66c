//! Anchor templates shared by all feature map scales.

use crate::common::*;
use bbox::{shape, CxCyWH, WH};

/// Derive anchor sizes for one stride from area ratios and aspect ratios.
///
/// The feature map area is `(height / stride) * (width / stride)` with
/// integer division. For every scale and every aspect listed for that
/// scale, the anchor width is `floor(sqrt(area * scale))` and the height is
/// `width * aspect`. The output order follows the input order.
pub fn generate_anchor(
    input_size: [usize; 2],
    stride: usize,
    anchor_scales: &[f64],
    anchor_aspects: &[Vec<f64>],
) -> Result<Vec<WH<f64>>> {
    ensure!(stride > 0, "stride must be positive");
    ensure!(
        anchor_scales.len() == anchor_aspects.len(),
        "the number of anchor scales ({}) does not match the number of aspect lists ({})",
        anchor_scales.len(),
        anchor_aspects.len()
    );

    let [height, width] = input_size;
    let fmap_area = ((height / stride) * (width / stride)) as f64;

    let sizes: Vec<_> = anchor_scales
        .iter()
        .zip(anchor_aspects)
        .flat_map(|(&scale, aspects)| {
            let anchor_w = (fmap_area * scale).sqrt().floor();
            aspects.iter().map(move |&aspect| [anchor_w, anchor_w * aspect])
        })
        .map(WH::try_from_wh)
        .collect::<Result<_>>()?;

    Ok(sizes)
}

/// The ordered anchor sizes across all scale levels.
///
/// Anchors are stored flat in scale order. Each scale owns the same number
/// of anchors, so a flat index is split into the scale level and the index
/// within the scale by integer division.
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct AnchorTemplates {
    #[get = "pub"]
    strides: Vec<usize>,
    #[get = "pub"]
    anchors: Vec<WH<f64>>,
    anchors_per_scale: usize,
}

impl AnchorTemplates {
    pub fn new(strides: Vec<usize>, anchors: Vec<WH<f64>>) -> Result<Self> {
        ensure!(!strides.is_empty(), "the stride list must not be empty");
        ensure!(
            strides.iter().all(|&stride| stride > 0),
            "strides must be positive, but get {:?}",
            strides
        );
        ensure!(
            !anchors.is_empty() && anchors.len() % strides.len() == 0,
            "the number of anchors ({}) must be a positive multiple of the number of strides ({})",
            anchors.len(),
            strides.len()
        );
        ensure!(
            anchors.iter().all(|size| size.w() > 0.0 && size.h() > 0.0),
            "anchor sizes must be positive"
        );

        let anchors_per_scale = anchors.len() / strides.len();

        Ok(Self {
            strides,
            anchors,
            anchors_per_scale,
        })
    }

    /// Generate the anchors for every stride and concatenate them in stride order.
    pub fn generate(
        input_size: [usize; 2],
        strides: Vec<usize>,
        anchor_scales: &[f64],
        anchor_aspects: &[Vec<f64>],
    ) -> Result<Self> {
        let anchors: Vec<_> = strides
            .iter()
            .map(|&stride| generate_anchor(input_size, stride, anchor_scales, anchor_aspects))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect();
        Self::new(strides, anchors)
    }

    pub fn num_scales(&self) -> usize {
        self.strides.len()
    }

    pub fn anchors_per_scale(&self) -> usize {
        self.anchors_per_scale
    }

    pub fn num_anchors(&self) -> usize {
        self.anchors.len()
    }

    /// Split a flat anchor index into `(scale_index, anchor_index)`.
    pub fn locate(&self, flat_index: usize) -> (usize, usize) {
        let scale_index = flat_index / self.anchors_per_scale;
        let anchor_index = flat_index - scale_index * self.anchors_per_scale;
        (scale_index, anchor_index)
    }

    /// The anchor sizes of a scale level.
    pub fn scale_anchors(&self, scale_index: usize) -> &[WH<f64>] {
        let begin = scale_index * self.anchors_per_scale;
        &self.anchors[begin..(begin + self.anchors_per_scale)]
    }

    /// All anchors as boxes centered at the origin, ready for shape matching.
    pub fn anchor_boxes(&self) -> Vec<CxCyWH<f64>> {
        shape::set_anchors(&self.anchors)
    }

    /// Feature map sizes `[height, width]` per scale for an input size `[height, width]`.
    pub fn grid_sizes(&self, input_size: [usize; 2]) -> Result<Vec<[usize; 2]>> {
        let [height, width] = input_size;
        self.strides
            .iter()
            .map(|&stride| {
                ensure!(
                    height >= stride && width >= stride,
                    "input size {:?} is smaller than stride {}",
                    input_size,
                    stride
                );
                Ok([height / stride, width / stride])
            })
            .collect()
    }

    /// The total number of anchor cells over all scales for an input size.
    pub fn num_cells(&self, input_size: [usize; 2]) -> Result<usize> {
        let num_cells = self
            .grid_sizes(input_size)?
            .into_iter()
            .map(|[grid_h, grid_w]| grid_h * grid_w * self.anchors_per_scale)
            .sum();
        Ok(num_cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn generate_from_scales_and_aspects() -> Result<()> {
        // 13 * 13 = 169 cells
        let anchors = generate_anchor([416, 416], 32, &[0.25, 0.5], &[vec![1.0, 2.0], vec![0.5]])?;
        let sizes: Vec<_> = anchors.iter().map(|size| size.wh()).collect();
        assert_eq!(sizes, vec![[6.0, 6.0], [6.0, 12.0], [9.0, 4.5]]);
        Ok(())
    }

    #[test]
    fn non_square_input_uses_integer_division() -> Result<()> {
        // (200 / 32) * (300 / 32) = 6 * 9 = 54
        let anchors = generate_anchor([200, 300], 32, &[1.0], &[vec![1.0]])?;
        assert_abs_diff_eq!(anchors[0].w(), 54f64.sqrt().floor());
        Ok(())
    }

    #[test]
    fn reject_mismatched_scales_and_aspects() {
        assert!(generate_anchor([416, 416], 32, &[0.25, 0.5], &[vec![1.0]]).is_err());
    }

    #[test]
    fn locate_flat_index() -> Result<()> {
        let anchors = (1..=6)
            .map(|side| WH::from_wh([side as f64, side as f64]))
            .collect();
        let templates = AnchorTemplates::new(vec![8, 16, 32], anchors)?;

        assert_eq!(templates.anchors_per_scale(), 2);
        assert_eq!(templates.locate(0), (0, 0));
        assert_eq!(templates.locate(3), (1, 1));
        assert_eq!(templates.locate(4), (2, 0));
        assert_eq!(templates.scale_anchors(1)[0].w(), 3.0);
        Ok(())
    }

    #[test]
    fn reject_bad_templates() {
        let anchors = || vec![WH::from_wh([1.0, 2.0]); 3];
        assert!(AnchorTemplates::new(vec![], anchors()).is_err());
        assert!(AnchorTemplates::new(vec![8, 16], anchors()).is_err());
        assert!(AnchorTemplates::new(vec![0, 8, 16], anchors()).is_err());
        assert!(AnchorTemplates::new(vec![8], vec![WH::from_wh([0.0, 2.0])]).is_err());
    }

    #[test]
    fn generate_per_stride() -> Result<()> {
        let templates =
            AnchorTemplates::generate([416, 416], vec![16, 32], &[0.25], &[vec![1.0, 2.0]])?;
        assert_eq!(templates.num_anchors(), 4);
        assert_eq!(templates.anchors_per_scale(), 2);
        // 26 * 26 * 0.25 = 169
        assert_eq!(templates.anchors()[0].wh(), [13.0, 13.0]);
        assert_eq!(templates.anchors()[2].wh(), [6.0, 6.0]);

        assert_eq!(templates.grid_sizes([416, 416])?, vec![[26, 26], [13, 13]]);
        assert_eq!(templates.num_cells([416, 416])?, (26 * 26 + 13 * 13) * 2);
        assert!(templates.grid_sizes([16, 416]).is_err());
        Ok(())
    }
}

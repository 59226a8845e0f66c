use crate::{common::*, decode::AnchorGrid};

/// Unchecked detector outputs.
#[derive(Debug, TensorLike)]
pub struct YoloPredictionUnchecked {
    /// Objectness logits in shape `[batch, entries, 1]`.
    pub objectness: Tensor,
    /// Class logits in shape `[batch, entries, classes]`.
    pub class: Tensor,
    /// Raw `tx, ty, tw, th` in shape `[batch, entries, 4]`.
    pub txtytwth: Tensor,
}

/// Checked detector outputs laid out in the target tensor order.
#[derive(Debug, Getters)]
pub struct YoloPrediction {
    #[get = "pub"]
    objectness: Tensor,
    #[get = "pub"]
    class: Tensor,
    #[get = "pub"]
    txtytwth: Tensor,
    /// Decoded normalized `xmin, ymin, xmax, ymax` in shape `[batch, entries, 4]`.
    #[get = "pub"]
    bbox: Option<Tensor>,
}

impl YoloPrediction {
    pub fn batch_size(&self) -> i64 {
        self.objectness.size()[0]
    }

    pub fn num_entries(&self) -> i64 {
        self.objectness.size()[1]
    }

    pub fn num_classes(&self) -> i64 {
        self.class.size()[2]
    }

    pub fn device(&self) -> Device {
        self.objectness.device()
    }

    /// Attach decoded boxes produced by the detector.
    pub fn with_bbox(self, bbox: Tensor) -> Result<Self> {
        let expect = [self.batch_size(), self.num_entries(), 4];
        ensure!(
            bbox.size() == expect,
            "expect box shape {:?}, but get {:?}",
            expect,
            bbox.size()
        );
        ensure!(bbox.device() == self.device(), "device mismatch");

        Ok(Self {
            bbox: Some(bbox),
            ..self
        })
    }

    /// Decode the regression outputs with an anchor grid and attach the boxes.
    pub fn decode_with(self, grid: &AnchorGrid) -> Result<Self> {
        let bbox = grid.decode(&self.txtytwth)?.to_tensor();
        self.with_bbox(bbox)
    }
}

impl TryFrom<YoloPredictionUnchecked> for YoloPrediction {
    type Error = Error;

    fn try_from(from: YoloPredictionUnchecked) -> Result<Self, Self::Error> {
        let YoloPredictionUnchecked {
            objectness,
            class,
            txtytwth,
        } = from;

        let (obj_batch, obj_entries, obj_channels) = objectness.size3()?;
        let (class_batch, class_entries, num_classes) = class.size3()?;
        let (box_batch, box_entries, box_params) = txtytwth.size3()?;

        ensure!(
            obj_channels == 1 && box_params == 4 && num_classes > 0,
            "expect objectness [_, _, 1], class [_, _, C] and box [_, _, 4] tensors"
        );
        ensure!(
            obj_batch == class_batch
                && obj_batch == box_batch
                && obj_entries == class_entries
                && obj_entries == box_entries,
            "size mismatch"
        );
        let device = objectness.device();
        ensure!(
            class.device() == device && txtytwth.device() == device,
            "device mismatch"
        );

        Ok(Self {
            objectness,
            class,
            txtytwth,
            bbox: None,
        })
    }
}

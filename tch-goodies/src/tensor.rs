use crate::common::*;

pub trait TensorExt {
    fn is_empty(&self) -> bool;

    /// Sum each sample over all but the first dimension, then average over samples.
    ///
    /// It returns a zero scalar if there is no sample.
    fn sum_per_sample_mean(&self) -> Tensor;
}

impl TensorExt for Tensor {
    fn is_empty(&self) -> bool {
        self.numel() == 0
    }

    fn sum_per_sample_mean(&self) -> Tensor {
        let size = self.size();
        if size.first().map(|&batch_size| batch_size == 0).unwrap_or(true) {
            return Tensor::zeros(&[], (Kind::Float, self.device())).set_requires_grad(false);
        }

        let per_sample = if size.len() > 1 {
            let dims: Vec<i64> = (1..size.len() as i64).collect();
            self.sum_dim_intlist(&dims, false, Kind::Float)
        } else {
            self.to_kind(Kind::Float)
        };
        per_sample.mean(Kind::Float)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn sum_then_mean() {
        let values = Tensor::of_slice(&[1f32, 2.0, 3.0, 4.0, 5.0, 6.0]).view([2, 3]);
        let reduced = values.sum_per_sample_mean();
        assert_eq!(reduced.size(), Vec::<i64>::new());
        assert_abs_diff_eq!(reduced.double_value(&[]), 10.5);
    }

    #[test]
    fn empty_batch_is_zero() {
        let values = Tensor::zeros(&[0, 3], (Kind::Float, Device::Cpu));
        assert_eq!(values.sum_per_sample_mean().double_value(&[]), 0.0);
        assert!(TensorExt::is_empty(&values));
    }
}

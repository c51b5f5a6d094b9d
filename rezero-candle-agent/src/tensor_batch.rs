use crate::error::AgentError;
use anyhow::Result;
use candle_core::{Device, IndexOp, Tensor};
use rezero_core::replay_buffer::BatchBase;

/// A buffer consisting of a [`Tensor`].
///
/// The first axis is the batch axis. The internal tensor is allocated on the
/// first push with the shape `[capacity, data.dims()[1..]]` and kept on CPU.
#[derive(Clone, Debug)]
pub struct TensorBatch {
    buf: Option<Tensor>,
    capacity: usize,
}

impl TensorBatch {
    /// Wraps a tensor whose first axis is the batch axis.
    pub fn from_tensor(t: Tensor) -> Self {
        let capacity = t.dims().first().copied().unwrap_or(0);
        Self {
            buf: Some(t),
            capacity,
        }
    }
}

impl BatchBase for TensorBatch {
    fn new(capacity: usize) -> Self {
        Self {
            buf: None,
            capacity,
        }
    }

    /// Pushes given data.
    ///
    /// If the internal buffer is empty, it will be initialized with the shape
    /// `[capacity, data.buf.dims()[1..]]`.
    fn push(&mut self, index: usize, data: Self) -> Result<()> {
        let data = match data.buf {
            Some(data) if data.dims().first().is_some_and(|&n| n > 0) => data,
            _ => return Ok(()),
        };
        let batch_size = data.dims()[0];

        let buf = match self.buf.take() {
            Some(buf) => buf,
            None => {
                let mut shape = data.dims().to_vec();
                shape[0] = self.capacity;
                Tensor::zeros(shape, data.dtype(), &Device::Cpu)?
            }
        };
        let data = data.to_device(&Device::Cpu)?;

        if index + batch_size > self.capacity {
            let n = self.capacity - index;
            buf.slice_set(&data.i((..n,))?, 0, index)?;
            buf.slice_set(&data.i((n..,))?, 0, 0)?;
        } else {
            buf.slice_set(&data, 0, index)?;
        }
        self.buf = Some(buf);

        Ok(())
    }

    fn sample(&self, ixs: &[usize]) -> Result<Self> {
        let buf = self.buf.as_ref().ok_or(AgentError::EmptyTensorBatch)?;
        let capacity = ixs.len();
        let ixs = {
            let ixs = ixs.iter().map(|x| *x as u32).collect();
            Tensor::from_vec(ixs, &[capacity], buf.device())?
        };
        let buf = Some(buf.index_select(&ixs, 0)?);
        Ok(Self { buf, capacity })
    }
}

impl TryFrom<TensorBatch> for Tensor {
    type Error = AgentError;

    fn try_from(b: TensorBatch) -> Result<Self, Self::Error> {
        b.buf.ok_or(AgentError::EmptyTensorBatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(t: &[[f32; 2]]) -> Result<TensorBatch> {
        let v = t.iter().flatten().copied().collect::<Vec<_>>();
        let t = Tensor::from_vec(v, (t.len(), 2), &Device::Cpu)?;
        Ok(TensorBatch::from_tensor(t))
    }

    #[test]
    fn test_push_wraps_around() -> Result<()> {
        let mut batch = TensorBatch::new(3);
        batch.push(0, rows(&[[0.0, 0.5], [1.0, 1.5]])?)?;
        batch.push(2, rows(&[[2.0, 2.5], [3.0, 3.5]])?)?;

        let t = Tensor::try_from(batch)?;
        assert_eq!(
            t.to_vec2::<f32>()?,
            vec![vec![3.0, 3.5], vec![1.0, 1.5], vec![2.0, 2.5]]
        );

        Ok(())
    }

    #[test]
    fn test_sample_with_repeated_indices() -> Result<()> {
        let mut batch = TensorBatch::new(4);
        for i in 0..4 {
            batch.push(i, rows(&[[i as f32, -(i as f32)]])?)?;
        }

        let sampled = Tensor::try_from(batch.sample(&[3, 1, 3])?)?;
        assert_eq!(
            sampled.to_vec2::<f32>()?,
            vec![vec![3.0, -3.0], vec![1.0, -1.0], vec![3.0, -3.0]]
        );

        Ok(())
    }

    #[test]
    fn test_sample_from_empty_batch_fails() {
        let batch = TensorBatch::new(4);
        assert!(batch.sample(&[0]).is_err());
    }
}

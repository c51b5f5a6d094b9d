//! Conversions between CartPole types and candle tensors.
use crate::{CartPoleAct, CartPoleError, CartPoleObs};
use anyhow::Result;
use candle_core::{Device, Tensor};
use rezero_candle_agent::TensorBatch;
use rezero_core::replay_buffer::BatchBase;

impl TryFrom<CartPoleObs> for Tensor {
    type Error = anyhow::Error;

    /// Returns a `f32` tensor of shape `(1, 4)`.
    fn try_from(obs: CartPoleObs) -> Result<Self> {
        Ok(Tensor::from_slice(&obs.0, (1, 4), &Device::Cpu)?)
    }
}

impl TryFrom<Tensor> for CartPoleAct {
    type Error = anyhow::Error;

    /// Takes the first element of an `i64` tensor.
    fn try_from(t: Tensor) -> Result<Self> {
        let a = t.flatten_all()?.to_vec1::<i64>()?;
        let a = a.first().ok_or(CartPoleError::EmptyAction)?;
        Ok(Self(*a))
    }
}

/// Observations in the replay buffer, a `f32` tensor of shape `(n, 4)`.
pub struct ObsBatch(TensorBatch);

impl BatchBase for ObsBatch {
    fn new(capacity: usize) -> Self {
        Self(TensorBatch::new(capacity))
    }

    fn push(&mut self, ix: usize, data: Self) -> Result<()> {
        self.0.push(ix, data.0)
    }

    fn sample(&self, ixs: &[usize]) -> Result<Self> {
        Ok(Self(self.0.sample(ixs)?))
    }
}

impl TryFrom<CartPoleObs> for ObsBatch {
    type Error = anyhow::Error;

    fn try_from(obs: CartPoleObs) -> Result<Self> {
        Ok(Self(TensorBatch::from_tensor(obs.try_into()?)))
    }
}

impl TryFrom<ObsBatch> for Tensor {
    type Error = anyhow::Error;

    fn try_from(b: ObsBatch) -> Result<Self> {
        Ok(Tensor::try_from(b.0)?)
    }
}

/// Actions in the replay buffer, an `i64` tensor of shape `(n, 1)`.
pub struct ActBatch(TensorBatch);

impl BatchBase for ActBatch {
    fn new(capacity: usize) -> Self {
        Self(TensorBatch::new(capacity))
    }

    fn push(&mut self, ix: usize, data: Self) -> Result<()> {
        self.0.push(ix, data.0)
    }

    fn sample(&self, ixs: &[usize]) -> Result<Self> {
        Ok(Self(self.0.sample(ixs)?))
    }
}

impl TryFrom<CartPoleAct> for ActBatch {
    type Error = anyhow::Error;

    fn try_from(act: CartPoleAct) -> Result<Self> {
        let t = Tensor::from_slice(&[act.0], (1, 1), &Device::Cpu)?;
        Ok(Self(TensorBatch::from_tensor(t)))
    }
}

impl TryFrom<ActBatch> for Tensor {
    type Error = anyhow::Error;

    fn try_from(b: ActBatch) -> Result<Self> {
        Ok(Tensor::try_from(b.0)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;

    #[test]
    fn test_obs_and_act_tensors() -> Result<()> {
        let t = Tensor::try_from(CartPoleObs([0.1, 0.2, 0.3, 0.4]))?;
        assert_eq!(t.dims(), &[1, 4]);
        assert_eq!(t.dtype(), DType::F32);

        let act = CartPoleAct::try_from(Tensor::new(&[1i64], &Device::Cpu)?)?;
        assert_eq!(act, CartPoleAct(1));

        let empty = Tensor::zeros((0,), DType::I64, &Device::Cpu)?;
        assert!(CartPoleAct::try_from(empty).is_err());

        Ok(())
    }

    #[test]
    fn test_batches() -> Result<()> {
        let mut obs = ObsBatch::new(2);
        let mut act = ActBatch::new(2);
        for i in 0..3 {
            let v = i as f32;
            obs.push(i % 2, ObsBatch::try_from(CartPoleObs([v, v, v, v]))?)?;
            act.push(i % 2, ActBatch::try_from(CartPoleAct(i as i64 % 2))?)?;
        }

        let obs = Tensor::try_from(obs.sample(&[0, 1])?)?;
        assert_eq!(obs.dims(), &[2, 4]);
        assert_eq!(obs.to_vec2::<f32>()?[0], vec![2.0; 4]);

        let act = Tensor::try_from(act.sample(&[1, 0])?)?;
        assert_eq!(act.dims(), &[2, 1]);
        assert_eq!(act.to_vec2::<i64>()?, vec![vec![1], vec![0]]);

        Ok(())
    }
}

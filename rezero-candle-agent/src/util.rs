//! Utilities.
use crate::error::AgentError;
use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarMap;
use log::trace;
use serde::{Deserialize, Serialize};

/// Critic loss type.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy, Default)]
pub enum CriticLoss {
    /// Mean squared error.
    #[default]
    Mse,

    /// Smooth L1 loss.
    SmoothL1,
}

/// Apply soft update on variables.
///
/// Variables are identified by their names.
///
/// dest = tau * src + (1.0 - tau) * dest
pub fn track(dest: &VarMap, src: &VarMap, tau: f64) -> Result<()> {
    trace!("track: tau = {}", tau);
    let dest = dest.data().lock().map_err(|_| AgentError::PoisonedVarMap)?;
    let src = src.data().lock().map_err(|_| AgentError::PoisonedVarMap)?;

    for (name, v_dest) in dest.iter() {
        let v_src = src
            .get(name)
            .ok_or_else(|| AgentError::MissingParameter(name.clone()))?;
        let t_src = (tau * v_src.as_tensor())?;
        let t_dest = ((1.0 - tau) * v_dest.as_tensor())?;
        v_dest.set(&(t_src + t_dest)?)?;
    }

    Ok(())
}

/// Interface for handling output dimensions.
pub trait OutDim {
    /// Returns the output dimension.
    fn get_out_dim(&self) -> usize;

    /// Sets the output dimension.
    fn set_out_dim(&mut self, v: usize);
}

/// See <https://pytorch.org/docs/stable/generated/torch.nn.SmoothL1Loss.html>.
pub fn smooth_l1_loss(x: &Tensor, y: &Tensor) -> Result<Tensor, candle_core::Error> {
    let d = (x - y)?.abs()?;
    let m1 = d.lt(1.0)?.to_dtype(DType::F32)?;
    let m2 = m1.affine(-1.0, 1.0)?;
    let quadratic = ((0.5 * &m1)? * d.sqr()?)?;
    let linear = (m2 * (&d - 0.5)?)?;
    (quadratic + linear)?.mean_all()
}

/// Returns `gamma * (1 - done)` for each transition, where an episode is done
/// if it is either terminated or truncated.
pub fn discount_not_done(
    gamma: f64,
    is_terminated: &[i8],
    is_truncated: &[i8],
    device: &Device,
) -> Result<Tensor> {
    let batch_size = is_terminated.len();
    let v = is_terminated
        .iter()
        .zip(is_truncated.iter())
        .map(|(e1, e2)| gamma as f32 * (1 - (*e1 | *e2)) as f32)
        .collect::<Vec<_>>();
    Ok(Tensor::from_slice(&v[..], (batch_size,), device)?)
}

/// Converts rewards into a tensor of shape `(batch_size,)`.
pub fn reward(reward: &[f32], device: &Device) -> Result<Tensor> {
    Ok(Tensor::from_slice(reward, (reward.len(),), device)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_nn::Init;

    fn varmap_with(t: &Tensor) -> Result<VarMap> {
        let vm = VarMap::new();
        let init = Init::Randn {
            mean: 0.0,
            stdev: 1.0,
        };
        vm.get((3,), "var1", init, DType::F32, &Device::Cpu)?;
        vm.data().lock().unwrap().get("var1").unwrap().set(t)?;
        Ok(vm)
    }

    fn var1(vm: &VarMap) -> Tensor {
        vm.data()
            .lock()
            .unwrap()
            .get("var1")
            .unwrap()
            .as_tensor()
            .clone()
    }

    #[test]
    fn test_track() -> Result<()> {
        let tau = 0.7;
        let t_src = Tensor::from_slice(&[1.0f32, 2.0, 3.0], (3,), &Device::Cpu)?;
        let t_dest = Tensor::from_slice(&[4.0f32, 5.0, 6.0], (3,), &Device::Cpu)?;
        let t = ((tau * &t_src)? + (1.0 - tau) * &t_dest)?;

        let vm_src = varmap_with(&t_src)?;
        let vm_dest = varmap_with(&t_dest)?;
        track(&vm_dest, &vm_src, tau)?;

        let t_ = var1(&vm_dest);
        assert!((t - t_)?.abs()?.sum(0)?.to_scalar::<f32>()? < 1e-6);

        Ok(())
    }

    #[test]
    fn test_track_hard_copy() -> Result<()> {
        let t_src = Tensor::from_slice(&[1.0f32, -2.0, 3.5], (3,), &Device::Cpu)?;
        let vm_src = varmap_with(&t_src)?;
        let vm_dest = varmap_with(&Tensor::zeros((3,), DType::F32, &Device::Cpu)?)?;
        track(&vm_dest, &vm_src, 1.0)?;

        assert_eq!(var1(&vm_dest).to_vec1::<f32>()?, vec![1.0, -2.0, 3.5]);

        Ok(())
    }

    #[test]
    fn test_smooth_l1_loss() -> Result<()> {
        let x = Tensor::from_slice(&[0.0f32, 0.0], (2,), &Device::Cpu)?;
        let y = Tensor::from_slice(&[0.5f32, 3.0], (2,), &Device::Cpu)?;
        let loss = smooth_l1_loss(&x, &y)?.to_scalar::<f32>()?;

        // (0.5 * 0.5^2 + (3.0 - 0.5)) / 2
        assert!((loss - 1.3125).abs() < 1e-6);

        Ok(())
    }

    #[test]
    fn test_discount_not_done() -> Result<()> {
        let t = discount_not_done(0.9, &[0, 1, 0], &[0, 0, 1], &Device::Cpu)?;
        assert_eq!(t.to_vec1::<f32>()?, vec![0.9, 0.0, 0.0]);

        Ok(())
    }
}

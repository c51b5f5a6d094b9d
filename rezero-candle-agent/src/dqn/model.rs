use crate::{
    error::AgentError,
    model::SubModel1,
    opt::{Optimizer, OptimizerConfig},
    util::OutDim,
};
use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`DqnModel`].
pub struct DqnModelConfig<Q>
where
    Q: OutDim,
{
    pub(super) q_config: Option<Q>,
    pub(super) opt_config: OptimizerConfig,
}

impl<Q> Default for DqnModelConfig<Q>
where
    Q: OutDim,
{
    fn default() -> Self {
        Self {
            q_config: None,
            opt_config: OptimizerConfig::default(),
        }
    }
}

impl<Q> DqnModelConfig<Q>
where
    Q: DeserializeOwned + Serialize + OutDim,
{
    /// Sets configurations for action-value function.
    pub fn q_config(mut self, v: Q) -> Self {
        self.q_config = Some(v);
        self
    }

    /// Sets output dimension of the model.
    pub fn out_dim(mut self, v: usize) -> Self {
        if let Some(q_config) = &mut self.q_config {
            q_config.set_out_dim(v);
        }
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Constructs [`DqnModelConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`DqnModelConfig`] to as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Action-value function with its parameters and optimizer.
pub struct DqnModel<Q>
where
    Q: SubModel1<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim,
{
    varmap: VarMap,

    // Dimension of the output vector (equal to the number of actions).
    pub(super) out_dim: usize,

    // Action-value function
    q: Q,

    // None for a target network, which is never stepped
    opt: Option<Optimizer>,
}

impl<Q> DqnModel<Q>
where
    Q: SubModel1<Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    fn build_(q_config: Option<Q::Config>, device: &Device) -> Result<Self> {
        let q_config = q_config.ok_or(AgentError::MissingQConfig)?;
        let out_dim = q_config.get_out_dim();
        let varmap = VarMap::new();
        let q = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
            Q::build(vb, q_config)?
        };

        Ok(Self {
            varmap,
            out_dim,
            q,
            opt: None,
        })
    }

    /// Constructs [`DqnModel`] with an optimizer over its parameters.
    pub fn build(config: DqnModelConfig<Q::Config>, device: Device) -> Result<Self> {
        let mut model = Self::build_(config.q_config, &device)?;
        model.opt = Some(config.opt_config.build(model.varmap.all_vars())?);
        Ok(model)
    }

    /// Constructs [`DqnModel`] without an optimizer.
    ///
    /// Parameters of the model are only updated with
    /// [`track`](crate::util::track) or [`DqnModel::load`].
    pub fn build_target(config: DqnModelConfig<Q::Config>, device: Device) -> Result<Self> {
        Self::build_(config.q_config, &device)
    }

    /// Outputs the action-value given observation(s).
    pub fn forward(&self, obs: &Q::Input) -> Result<Tensor> {
        self.q.forward(obs)
    }

    /// Takes a gradient step on the parameters minimizing `loss`.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        self.opt
            .as_mut()
            .ok_or(AgentError::MissingOptimizer)?
            .backward_step(loss)
    }

    /// Returns the parameters of the model.
    pub fn get_varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Saves the parameters in safetensors format.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.varmap.save(&path)?;
        info!("Save dqnmodel to {:?}", path.as_ref());
        Ok(())
    }

    /// Loads the parameters saved with [`DqnModel::save`].
    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.varmap.load(&path)?;
        info!("Load dqnmodel from {:?}", path.as_ref());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mlp::{Mlp, MlpConfig};

    fn config() -> DqnModelConfig<MlpConfig> {
        DqnModelConfig::default().q_config(MlpConfig::new(3, vec![8], 2, false))
    }

    #[test]
    fn test_target_model_has_no_optimizer() -> Result<()> {
        let mut model = DqnModel::<Mlp>::build(config(), Device::Cpu)?;
        let mut model_tgt = DqnModel::<Mlp>::build_target(config(), Device::Cpu)?;
        assert!(model.opt.is_some());
        assert!(model_tgt.opt.is_none());

        let obs = Tensor::ones((4, 3), DType::F32, &Device::Cpu)?;
        let loss = model.forward(&obs)?.sqr()?.mean_all()?;
        model.backward_step(&loss)?;

        let loss_tgt = model_tgt.forward(&obs)?.sqr()?.mean_all()?;
        let err = model_tgt.backward_step(&loss_tgt).err().unwrap();
        assert_eq!(
            err.downcast_ref::<AgentError>(),
            Some(&AgentError::MissingOptimizer)
        );

        Ok(())
    }
}

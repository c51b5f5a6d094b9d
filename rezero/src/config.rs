//! Configuration of a training run.
use anyhow::Result;
use rezero_candle_agent::{
    dqn::{DqnConfig, DqnModelConfig, EpsilonGreedy},
    mlp::{Mlp, MlpConfig},
    opt::OptimizerConfig,
    util::CriticLoss,
    Device,
};
use rezero_cartpole_env::CartPoleEnvConfig;
use rezero_core::{replay_buffer::SimpleReplayBufferConfig, TrainerConfig};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Dimension of CartPole observations.
pub const DIM_OBS: usize = 4;

/// Number of CartPole actions.
pub const DIM_ACT: usize = 2;

/// Configurations of the environment, the agent, the replay buffer and the trainer.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RezeroConfig {
    /// Environment.
    pub env_config: CartPoleEnvConfig,

    /// DQN agent.
    pub agent_config: DqnConfig<Mlp>,

    /// Replay buffer.
    pub replay_buffer_config: SimpleReplayBufferConfig,

    /// Training loop.
    pub trainer_config: TrainerConfig,

    /// Number of episodes in an evaluation.
    pub n_episodes_per_eval: usize,

    /// Random seed of the environments.
    pub seed: i64,
}

impl Default for RezeroConfig {
    fn default() -> Self {
        let model_config = DqnModelConfig::default()
            .q_config(MlpConfig::new(DIM_OBS, vec![128], DIM_ACT, false))
            .opt_config(OptimizerConfig::Adam { lr: 1e-2 });
        let agent_config = DqnConfig::default()
            .model_config(model_config)
            .batch_size(16)
            .min_transitions_warmup(16)
            .discount_factor(0.99)
            .sync_interval(10)
            .tau(1.0)
            .explorer(EpsilonGreedy::default())
            .critic_loss(CriticLoss::Mse)
            .device(Device::Cpu);
        let trainer_config = TrainerConfig::default()
            .max_opts(10_000)
            .opt_interval(1)
            .warmup_period(1000)
            .eval_interval(1000)
            .flush_record_interval(200)
            .record_compute_cost_interval(1000)
            .save_interval(5000)
            .model_dir("./model/dqn_cartpole");

        Self {
            env_config: CartPoleEnvConfig::default().max_episode_steps(200),
            agent_config,
            replay_buffer_config: SimpleReplayBufferConfig::default().capacity(1000),
            trainer_config,
            n_episodes_per_eval: 5,
            seed: 42,
        }
    }
}

impl RezeroConfig {
    /// Returns the directory where the trained models are saved.
    pub fn model_dir(&self) -> Option<&str> {
        self.trainer_config.model_dir.as_deref()
    }

    /// Loads [`RezeroConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`RezeroConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_rezero_config() -> Result<()> {
        let config = RezeroConfig::default();
        let dir = TempDir::new("rezero_config")?;
        let path = dir.path().join("config.yaml");

        config.save(&path)?;
        assert_eq!(RezeroConfig::load(&path)?, config);

        Ok(())
    }
}

//! DQN agent implemented with candle.
use super::{
    config::DqnConfig,
    explorer::{greedy, EpsilonGreedy},
    model::DqnModel,
};
use crate::{
    model::SubModel1,
    util::{discount_not_done, reward, smooth_l1_loss, track, CriticLoss, OutDim},
};
use anyhow::{ensure, Result};
use candle_core::{shape::D, Device, Tensor};
use candle_nn::loss::mse;
use log::{debug, info};
use rand::{rngs::SmallRng, SeedableRng};
use rezero_core::{
    record::{Record, RecordValue},
    Agent, Configurable, Env, ExperienceBufferBase, Policy, ReplayBufferBase, TransitionBatch,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fs, marker::PhantomData, path::Path};

/// DQN agent implemented with candle.
///
/// The online network `qnet` is trained on the Bellman target
/// `r + gamma * (1 - done) * max_a Q_tgt(o', a)`, where the target network
/// `qnet_tgt` starts as a copy of `qnet` and is synchronized with it every
/// `sync_interval` optimization steps.
pub struct Dqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Output = Tensor>,
    R: ReplayBufferBase,
    E::Obs: TryInto<Q::Input, Error = anyhow::Error>,
    E::Act: TryFrom<Tensor, Error = anyhow::Error>,
    Q::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
    R::Batch: TransitionBatch,
    <R::Batch as TransitionBatch>::ObsBatch: TryInto<Q::Input, Error = anyhow::Error>,
    <R::Batch as TransitionBatch>::ActBatch: TryInto<Tensor, Error = anyhow::Error>,
{
    sync_interval: usize,
    sync_counter: usize,
    min_transitions_warmup: usize,
    batch_size: usize,
    qnet: DqnModel<Q>,
    qnet_tgt: DqnModel<Q>,
    train: bool,
    phantom: PhantomData<(E, R)>,
    discount_factor: f64,
    tau: f64,
    explorer: EpsilonGreedy,
    device: Device,
    n_opts: usize,
    critic_loss: CriticLoss,
    rng: SmallRng,
}

impl<E, Q, R> Dqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Output = Tensor>,
    R: ReplayBufferBase,
    E::Obs: TryInto<Q::Input, Error = anyhow::Error>,
    E::Act: TryFrom<Tensor, Error = anyhow::Error>,
    Q::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
    R::Batch: TransitionBatch,
    <R::Batch as TransitionBatch>::ObsBatch: TryInto<Q::Input, Error = anyhow::Error>,
    <R::Batch as TransitionBatch>::ActBatch: TryInto<Tensor, Error = anyhow::Error>,
{
    fn update_critic(&mut self, buffer: &mut R) -> Result<f32> {
        let batch = buffer.batch(self.batch_size)?;
        let (obs, act, next_obs, rewards, is_terminated, is_truncated) = batch.unpack();
        let obs: Q::Input = obs.try_into()?;
        let act: Tensor = act.try_into()?;
        let act = act.to_device(&self.device)?;
        let next_obs: Q::Input = next_obs.try_into()?;
        let reward = reward(&rewards, &self.device)?;
        let not_done = discount_not_done(
            self.discount_factor,
            &is_terminated,
            &is_truncated,
            &self.device,
        )?;

        let pred = self
            .qnet
            .forward(&obs)?
            .gather(&act, D::Minus1)?
            .squeeze(D::Minus1)?;

        let tgt = {
            let q = self.qnet_tgt.forward(&next_obs)?.max(D::Minus1)?;
            (reward + (not_done * q)?)?.detach()
        };

        let loss = match self.critic_loss {
            CriticLoss::Mse => mse(&pred, &tgt)?,
            CriticLoss::SmoothL1 => smooth_l1_loss(&pred, &tgt)?,
        };

        self.qnet.backward_step(&loss)?;

        Ok(loss.to_scalar::<f32>()?)
    }

    fn opt_(&mut self, buffer: &mut R) -> Result<Record> {
        let loss = self.update_critic(buffer)?;
        self.n_opts += 1;

        self.sync_counter += 1;
        if self.sync_counter == self.sync_interval {
            self.sync_counter = 0;
            track(self.qnet_tgt.get_varmap(), self.qnet.get_varmap(), self.tau)?;
            debug!("Synchronized the target network, opt_steps = {}", self.n_opts);
        }

        Ok(Record::from_slice(&[
            ("loss", RecordValue::Scalar(loss)),
            ("epsilon", RecordValue::Scalar(self.epsilon() as f32)),
        ]))
    }

    /// Returns epsilon of the actions taken in training mode.
    ///
    /// Actions are uniformly random until the first optimization step.
    pub fn epsilon(&self) -> f64 {
        match self.n_opts {
            0 => 1.0,
            n => self.explorer.eps(n),
        }
    }

    /// Returns the number of optimization steps performed so far.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }

    /// Returns the action values of the online network.
    pub fn q_values(&self, obs: &E::Obs) -> Result<Tensor> {
        let obs: Q::Input = obs.clone().try_into()?;
        self.qnet.forward(&obs)
    }
}

impl<E, Q, R> Configurable for Dqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Output = Tensor>,
    R: ReplayBufferBase,
    E::Obs: TryInto<Q::Input, Error = anyhow::Error>,
    E::Act: TryFrom<Tensor, Error = anyhow::Error>,
    Q::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
    R::Batch: TransitionBatch,
    <R::Batch as TransitionBatch>::ObsBatch: TryInto<Q::Input, Error = anyhow::Error>,
    <R::Batch as TransitionBatch>::ActBatch: TryInto<Tensor, Error = anyhow::Error>,
{
    type Config = DqnConfig<Q>;

    /// Constructs DQN agent.
    ///
    /// Fails if `sync_interval` or `batch_size` is 0, or if
    /// `min_transitions_warmup` is smaller than `batch_size`.
    fn build(config: Self::Config) -> Result<Self> {
        ensure!(config.sync_interval > 0, "sync_interval must be positive");
        ensure!(config.batch_size > 0, "batch_size must be positive");
        ensure!(
            config.min_transitions_warmup >= config.batch_size,
            "min_transitions_warmup ({}) must not be smaller than batch_size ({})",
            config.min_transitions_warmup,
            config.batch_size
        );

        let device: Device = config.device.unwrap_or_default().try_into()?;
        let qnet = DqnModel::build(config.model_config.clone(), device.clone())?;
        let qnet_tgt = DqnModel::build_target(config.model_config, device.clone())?;
        track(qnet_tgt.get_varmap(), qnet.get_varmap(), 1.0)?;
        info!(
            "Built DQN agent with {} actions on {:?}",
            qnet.out_dim, device
        );

        Ok(Dqn {
            qnet,
            qnet_tgt,
            sync_interval: config.sync_interval,
            sync_counter: 0,
            min_transitions_warmup: config.min_transitions_warmup,
            batch_size: config.batch_size,
            discount_factor: config.discount_factor,
            tau: config.tau,
            train: config.train,
            explorer: config.explorer,
            device,
            n_opts: 0,
            critic_loss: config.critic_loss,
            phantom: PhantomData,
            rng: SmallRng::seed_from_u64(config.seed),
        })
    }
}

impl<E, Q, R> Policy<E> for Dqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Output = Tensor>,
    R: ReplayBufferBase,
    E::Obs: TryInto<Q::Input, Error = anyhow::Error>,
    E::Act: TryFrom<Tensor, Error = anyhow::Error>,
    Q::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
    R::Batch: TransitionBatch,
    <R::Batch as TransitionBatch>::ObsBatch: TryInto<Q::Input, Error = anyhow::Error>,
    <R::Batch as TransitionBatch>::ActBatch: TryInto<Tensor, Error = anyhow::Error>,
{
    /// In evaluation mode, takes the greedy action.
    fn sample(&mut self, obs: &E::Obs) -> Result<E::Act> {
        let q = self.q_values(obs)?;
        let a = match self.train {
            true => {
                let eps = self.epsilon();
                self.explorer.action(&q, eps, &mut self.rng)?
            }
            false => greedy(&q)?,
        };
        <E::Act as TryFrom<Tensor>>::try_from(a)
    }
}

impl<E, Q, R> Agent<E, R> for Dqn<E, Q, R>
where
    E: Env,
    Q: SubModel1<Output = Tensor>,
    R: ReplayBufferBase + ExperienceBufferBase,
    E::Obs: TryInto<Q::Input, Error = anyhow::Error>,
    E::Act: TryFrom<Tensor, Error = anyhow::Error>,
    Q::Config: DeserializeOwned + Serialize + OutDim + std::fmt::Debug + PartialEq + Clone,
    R::Batch: TransitionBatch,
    <R::Batch as TransitionBatch>::ObsBatch: TryInto<Q::Input, Error = anyhow::Error>,
    <R::Batch as TransitionBatch>::ActBatch: TryInto<Tensor, Error = anyhow::Error>,
{
    fn train(&mut self) {
        self.train = true;
    }

    fn eval(&mut self) {
        self.train = false;
    }

    fn is_train(&self) -> bool {
        self.train
    }

    fn opt(&mut self, buffer: &mut R) -> Result<Option<Record>> {
        if buffer.is_empty() || buffer.len() < self.min_transitions_warmup {
            return Ok(None);
        }
        Ok(Some(self.opt_(buffer)?))
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        self.qnet.save(path.join("qnet.safetensors"))?;
        self.qnet_tgt.save(path.join("qnet_tgt.safetensors"))?;
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.qnet.load(path.join("qnet.safetensors"))?;
        self.qnet_tgt.load(path.join("qnet_tgt.safetensors"))?;
        Ok(())
    }
}

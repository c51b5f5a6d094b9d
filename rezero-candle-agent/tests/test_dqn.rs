use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use rezero_candle_agent::{
    dqn::{Dqn, DqnConfig, DqnModelConfig, EpsilonGreedy},
    mlp::{Mlp, MlpConfig},
    opt::OptimizerConfig,
    TensorBatch,
};
use rezero_core::{
    record::{BufferedRecorder, Record},
    replay_buffer::{
        BatchBase, GenericTransitionBatch, SimpleReplayBuffer, SimpleReplayBufferConfig, SimpleStepProcessor,
        SimpleStepProcessorConfig,
    },
    Act, Agent, Configurable, DefaultEvaluator, Env, Evaluator, ExperienceBufferBase, Obs,
    Policy, ReplayBufferBase, Step, StepProcessor, Trainer, TrainerConfig,
};
use tempdir::TempDir;

/// Single-step episodes where action 1 pays 1 and action 0 pays 0.
mod bandit {
    use super::*;

    #[derive(Clone, Debug)]
    pub struct BanditObs(pub f32);

    impl Obs for BanditObs {}

    impl TryFrom<BanditObs> for Tensor {
        type Error = anyhow::Error;

        fn try_from(obs: BanditObs) -> Result<Self> {
            Ok(Tensor::from_vec(vec![obs.0], (1, 1), &Device::Cpu)?)
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    pub struct BanditAct(pub i64);

    impl Act for BanditAct {}

    impl TryFrom<Tensor> for BanditAct {
        type Error = anyhow::Error;

        fn try_from(t: Tensor) -> Result<Self> {
            Ok(Self(t.flatten_all()?.to_vec1::<i64>()?[0]))
        }
    }

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

    impl TryFrom<BanditObs> for ObsBatch {
        type Error = anyhow::Error;

        fn try_from(obs: BanditObs) -> Result<Self> {
            Ok(Self(TensorBatch::from_tensor(obs.try_into()?)))
        }
    }

    impl TryFrom<ObsBatch> for Tensor {
        type Error = anyhow::Error;

        fn try_from(b: ObsBatch) -> Result<Self> {
            Ok(Tensor::try_from(b.0)?)
        }
    }

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

    impl TryFrom<BanditAct> for ActBatch {
        type Error = anyhow::Error;

        fn try_from(act: BanditAct) -> Result<Self> {
            let t = Tensor::from_vec(vec![act.0], (1, 1), &Device::Cpu)?;
            Ok(Self(TensorBatch::from_tensor(t)))
        }
    }

    impl TryFrom<ActBatch> for Tensor {
        type Error = anyhow::Error;

        fn try_from(b: ActBatch) -> Result<Self> {
            Ok(Tensor::try_from(b.0)?)
        }
    }

    pub struct BanditEnv;

    impl Env for BanditEnv {
        type Config = ();
        type Obs = BanditObs;
        type Act = BanditAct;
        type Info = ();

        fn build(_config: &Self::Config, _seed: i64) -> Result<Self> {
            Ok(Self)
        }

        fn step(&mut self, a: &Self::Act) -> Result<(Step<Self>, Record)> {
            anyhow::ensure!(a.0 == 0 || a.0 == 1, "invalid action {}", a.0);
            let step = Step::new(
                BanditObs(1.0),
                a.clone(),
                vec![a.0 as f32],
                vec![1],
                vec![0],
                (),
                None,
            );
            Ok((step, Record::empty()))
        }

        fn reset(&mut self) -> Result<Self::Obs> {
            Ok(BanditObs(1.0))
        }

        fn step_with_reset(&mut self, a: &Self::Act) -> Result<(Step<Self>, Record)> {
            let (mut step, record) = self.step(a)?;
            step.init_obs = Some(self.reset()?);
            Ok((step, record))
        }

        fn reset_with_index(&mut self, _ix: usize) -> Result<Self::Obs> {
            self.reset()
        }
    }

    pub type ReplayBuffer = SimpleReplayBuffer<ObsBatch, ActBatch>;
    pub type StepProc = SimpleStepProcessor<BanditEnv, ObsBatch, ActBatch>;
    pub type DqnAgent = Dqn<BanditEnv, Mlp, ReplayBuffer>;
}

use bandit::*;

fn agent_config(min_transitions_warmup: usize) -> DqnConfig<Mlp> {
    let model_config = DqnModelConfig::default()
        .q_config(MlpConfig::new(1, vec![16], 2, false))
        .opt_config(OptimizerConfig::Adam { lr: 1e-2 });
    DqnConfig::default()
        .model_config(model_config)
        .min_transitions_warmup(min_transitions_warmup)
        .batch_size(min_transitions_warmup.min(16))
        .sync_interval(10)
        .explorer(EpsilonGreedy::new().final_step(100).eps_final(0.2))
        .seed(0)
}

#[test]
fn test_opt_is_skipped_before_warmup() -> Result<()> {
    let mut agent = DqnAgent::build(agent_config(4))?;
    let mut buffer = ReplayBuffer::build(&SimpleReplayBufferConfig::default());
    let mut env = BanditEnv::build(&(), 0)?;
    let mut step_proc = StepProc::build(&SimpleStepProcessorConfig::default());
    step_proc.reset(env.reset()?);
    agent.train();

    // Empty buffer.
    assert!(agent.opt(&mut buffer)?.is_none());

    for i in 0..4 {
        assert!(agent.opt(&mut buffer)?.is_none());
        assert_eq!(agent.epsilon(), 1.0);
        let obs = env.reset()?;
        let act = agent.sample(&obs)?;
        let (step, _) = env.step_with_reset(&act)?;
        buffer.push(step_proc.process(step)?)?;
        assert_eq!(buffer.len(), i + 1);
    }

    let record = agent.opt(&mut buffer)?.unwrap();
    assert!(record.get_scalar("loss")?.is_finite());
    assert!(record.get_scalar("epsilon")? < 1.0);
    assert_eq!(agent.n_opts(), 1);

    Ok(())
}

#[test]
fn test_dqn_learns_bandit() -> Result<()> {
    let tmp_dir = TempDir::new("test_dqn")?;
    let model_dir = tmp_dir.path().join("model");
    let trainer_config = TrainerConfig::default()
        .max_opts(300)
        .warmup_period(32)
        .eval_interval(100)
        .flush_record_interval(100)
        .model_dir(model_dir.to_str().unwrap());

    let mut trainer = Trainer::build(trainer_config);
    let mut agent = DqnAgent::build(agent_config(32))?;
    let mut buffer = ReplayBuffer::build(&SimpleReplayBufferConfig::default());
    let mut recorder = BufferedRecorder::new();
    let mut evaluator = DefaultEvaluator::new(BanditEnv::build(&(), 0)?, 3)?;
    let step_proc = StepProc::build(&SimpleStepProcessorConfig::default());

    trainer.train(
        BanditEnv::build(&(), 0)?,
        step_proc,
        &mut agent,
        &mut buffer,
        &mut recorder,
        &mut evaluator,
    )?;
    assert_eq!(agent.n_opts(), 300);

    // Terminal transitions only, so Q(o, a) approaches the reward of a.
    let q = agent.q_values(&BanditObs(1.0))?.flatten_all()?.to_vec1::<f32>()?;
    assert!((q[0] - 0.0).abs() < 0.2, "{:?}", q);
    assert!((q[1] - 1.0).abs() < 0.2, "{:?}", q);

    agent.eval();
    assert_eq!(agent.sample(&BanditObs(1.0))?, BanditAct(1));
    assert_eq!(evaluator.evaluate(&mut agent)?.get_scalar("eval_reward")?, 1.0);

    let last = recorder.iter().last().unwrap();
    assert!(last.get_scalar("loss_mean")? < 0.25);
    assert_eq!(last.get_scalar("epsilon_min")?, 0.2);

    // Saved parameters reproduce the action values.
    assert!(model_dir.join("best").join("qnet.safetensors").exists());
    assert!(model_dir.join("best").join("qnet_tgt.safetensors").exists());
    let path = tmp_dir.path().join("final");
    agent.save_params(&path)?;
    let mut agent_ = DqnAgent::build(agent_config(32))?;
    agent_.load_params(&path)?;
    let q_ = agent_
        .q_values(&BanditObs(1.0))?
        .flatten_all()?
        .to_vec1::<f32>()?;
    assert_eq!(q, q_);

    Ok(())
}

#[test]
fn test_target_network_starts_synchronized() -> Result<()> {
    let agent = DqnAgent::build(agent_config(1))?;
    let dir = TempDir::new("test_dqn_sync")?;
    agent.save_params(dir.path())?;

    let qnet = candle_core::safetensors::load(dir.path().join("qnet.safetensors"), &Device::Cpu)?;
    let qnet_tgt =
        candle_core::safetensors::load(dir.path().join("qnet_tgt.safetensors"), &Device::Cpu)?;
    assert_eq!(qnet.len(), qnet_tgt.len());
    for (name, t) in qnet.iter() {
        let diff = (t - &qnet_tgt[name])?.abs()?.sum_all()?.to_dtype(DType::F32)?;
        assert_eq!(diff.to_scalar::<f32>()?, 0.0);
    }

    Ok(())
}

#[test]
fn test_build_from_yaml() -> Result<()> {
    let dir = TempDir::new("test_dqn_config")?;
    let path = dir.path().join("agent.yaml");
    agent_config(8).save(&path)?;

    let agent = DqnAgent::build_from_path(&path)?;
    assert!(!agent.is_train());
    assert_eq!(agent.n_opts(), 0);
    assert_eq!(agent.q_values(&BanditObs(1.0))?.dims(), &[1, 2]);

    Ok(())
}

#[test]
fn test_invalid_config_is_rejected() {
    assert!(DqnAgent::build(agent_config(4).sync_interval(0)).is_err());
    assert!(DqnAgent::build(agent_config(4).batch_size(8)).is_err());
    assert!(DqnAgent::build(agent_config(0)).is_err());
}

/// Returns `true` if the parameters of the target network equal those of the online network.
fn is_synchronized(agent: &DqnAgent) -> Result<bool> {
    let dir = TempDir::new("test_dqn_params")?;
    agent.save_params(dir.path())?;
    let qnet = candle_core::safetensors::load(dir.path().join("qnet.safetensors"), &Device::Cpu)?;
    let qnet_tgt =
        candle_core::safetensors::load(dir.path().join("qnet_tgt.safetensors"), &Device::Cpu)?;
    for (name, t) in qnet.iter() {
        let diff = (t - &qnet_tgt[name])?.abs()?.sum_all()?.to_scalar::<f32>()?;
        if diff != 0.0 {
            return Ok(false);
        }
    }
    Ok(true)
}

#[test]
fn test_target_network_is_synchronized_periodically() -> Result<()> {
    let mut agent = DqnAgent::build(agent_config(4).sync_interval(3))?;
    let mut buffer = ReplayBuffer::build(&SimpleReplayBufferConfig::default());
    let mut env = BanditEnv::build(&(), 0)?;
    let mut step_proc = StepProc::build(&SimpleStepProcessorConfig::default());
    step_proc.reset(env.reset()?);
    agent.train();

    for a in [0, 1, 0, 1, 1, 0, 1, 0] {
        let (step, _) = env.step_with_reset(&BanditAct(a))?;
        buffer.push(step_proc.process(step)?)?;
    }
    assert!(is_synchronized(&agent)?);

    for i in 1..=7 {
        assert!(agent.opt(&mut buffer)?.is_some());
        assert_eq!(is_synchronized(&agent)?, i % 3 == 0, "opt_steps = {}", i);
    }

    Ok(())
}

/// Takes an optimization step on a buffer holding a single transition from
/// `BanditObs(1.0)` with action 1 and reward 0.5 to `BanditObs(-1.0)`.
///
/// Returns the loss, `Q(o, 1)` and `max_a Q_tgt(o', a)` before the step.
fn single_transition_loss(is_terminated: i8, is_truncated: i8) -> Result<(f32, f32, f32)> {
    let mut agent = DqnAgent::build(agent_config(1))?;
    let mut buffer = ReplayBuffer::build(&SimpleReplayBufferConfig::default().capacity(1));
    buffer.push(GenericTransitionBatch {
        obs: ObsBatch::try_from(BanditObs(1.0))?,
        act: ActBatch::try_from(BanditAct(1))?,
        next_obs: ObsBatch::try_from(BanditObs(-1.0))?,
        reward: vec![0.5],
        is_terminated: vec![is_terminated],
        is_truncated: vec![is_truncated],
    })?;

    // The target network is a copy of the online network before the first step.
    let pred = agent.q_values(&BanditObs(1.0))?.flatten_all()?.to_vec1::<f32>()?[1];
    let q_next = agent
        .q_values(&BanditObs(-1.0))?
        .flatten_all()?
        .to_vec1::<f32>()?;
    let max_q_next = q_next[0].max(q_next[1]);

    let record = agent.opt(&mut buffer)?.unwrap();
    Ok((record.get_scalar("loss")?, pred, max_q_next))
}

#[test]
fn test_bellman_target() -> Result<()> {
    let gamma = 0.99;

    // Non-terminal transitions bootstrap from the target network.
    let (loss, pred, max_q_next) = single_transition_loss(0, 0)?;
    let expected = (pred - (0.5 + gamma * max_q_next)).powi(2);
    assert!((loss - expected).abs() < 1e-5, "{} != {}", loss, expected);

    // Terminated and truncated transitions do not.
    for (is_terminated, is_truncated) in [(1, 0), (0, 1)] {
        let (loss, pred, _) = single_transition_loss(is_terminated, is_truncated)?;
        let expected = (pred - 0.5).powi(2);
        assert!((loss - expected).abs() < 1e-5, "{} != {}", loss, expected);
    }

    Ok(())
}

//! Train and evaluate a DQN agent on CartPole.
//!
//! [`train`] fills the replay buffer with `warmup_period` random steps, then
//! alternates environment steps and optimization steps until `max_opts`,
//! evaluating the greedy policy and saving the best parameters under
//! `(model_dir)/best`. [`eval`] loads saved parameters and reports the mean
//! return of the greedy policy.
pub mod config;
use anyhow::{ensure, Result};
pub use config::RezeroConfig;
use log::info;
use rezero_candle_agent::{dqn::Dqn, mlp::Mlp};
use rezero_cartpole_env::{ActBatch, CartPoleEnv, ObsBatch};
use rezero_core::{
    record::AggregateRecorder,
    replay_buffer::{SimpleReplayBuffer, SimpleStepProcessor, SimpleStepProcessorConfig},
    Agent, Configurable, DefaultEvaluator, Env, Evaluator, ReplayBufferBase, StepProcessor,
    Trainer,
};
use std::path::Path;

/// Transitions produced from CartPole steps.
pub type StepProc = SimpleStepProcessor<CartPoleEnv, ObsBatch, ActBatch>;

/// Replay buffer of CartPole transitions.
pub type ReplayBuffer = SimpleReplayBuffer<ObsBatch, ActBatch>;

/// DQN agent with an MLP Q-network.
pub type DqnAgent = Dqn<CartPoleEnv, Mlp, ReplayBuffer>;

/// Evaluator running the greedy policy.
pub type CartPoleEvaluator = DefaultEvaluator<CartPoleEnv>;

/// Trains a DQN agent and returns the best evaluation reward, if evaluated.
///
/// Fails before any environment step if the replay buffer cannot hold the
/// transitions the agent waits for.
pub fn train(config: &RezeroConfig, recorder: &mut dyn AggregateRecorder) -> Result<Option<f32>> {
    let capacity = config.replay_buffer_config.capacity;
    let min_transitions = config
        .agent_config
        .min_transitions_warmup
        .max(config.agent_config.batch_size);
    ensure!(
        capacity > 0 && min_transitions <= capacity,
        "replay buffer capacity ({}) must hold at least {} transitions",
        capacity,
        min_transitions
    );

    let mut trainer = Trainer::build(config.trainer_config.clone());
    let env = CartPoleEnv::build(&config.env_config, config.seed)?;
    let step_proc = StepProc::build(&SimpleStepProcessorConfig::default());
    let mut agent = DqnAgent::build(config.agent_config.clone())?;
    let mut buffer = ReplayBuffer::build(&config.replay_buffer_config);
    let mut evaluator = {
        let env = CartPoleEnv::build(&config.env_config, config.seed)?;
        CartPoleEvaluator::new(env, config.n_episodes_per_eval)?
    };

    trainer.train(
        env,
        step_proc,
        &mut agent,
        &mut buffer,
        recorder,
        &mut evaluator,
    )?;

    Ok(trainer.max_eval_reward())
}

/// Evaluates the parameters saved in `model_dir` and returns the mean return.
pub fn eval(config: &RezeroConfig, model_dir: impl AsRef<Path>) -> Result<f32> {
    let mut agent = DqnAgent::build(config.agent_config.clone())?;
    agent.load_params(model_dir.as_ref())?;
    agent.eval();

    let env = CartPoleEnv::build(&config.env_config, config.seed)?;
    let record = CartPoleEvaluator::new(env, config.n_episodes_per_eval)?.evaluate(&mut agent)?;
    let eval_reward = record.get_scalar("eval_reward")?;
    info!(
        "Mean return over {} episodes: {}",
        config.n_episodes_per_eval, eval_reward
    );

    Ok(eval_reward)
}

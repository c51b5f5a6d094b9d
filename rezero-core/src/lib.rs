#![warn(missing_docs)]
//! Core components of the rezero DQN training loop.
//!
//! This crate does not depend on any tensor backend or concrete environment.
//! It defines the interfaces through which an environment, an agent and a
//! replay buffer interact, and the training loop driving them:
//!
//! * [`Env`], [`Obs`], [`Act`] and [`Step`] describe the environment side.
//! * [`Policy`] and [`Agent`] describe the learner side.
//! * [`replay_buffer`] provides a bounded FIFO replay buffer with uniform sampling.
//! * [`Trainer`] runs warm-up, environment steps, optimization steps,
//!   evaluation and checkpointing.
//! * [`record`] carries metrics from the components to recorders.
pub mod error;
pub mod record;
pub mod replay_buffer;

mod base;
pub use base::{
    Act, Agent, Configurable, Env, ExperienceBufferBase, Info, Obs, Policy, ReplayBufferBase,
    Step, StepProcessor, TransitionBatch,
};

mod evaluator;
pub use evaluator::{DefaultEvaluator, Evaluator};

mod trainer;
pub use trainer::{Sampler, Trainer, TrainerConfig};

//! CartPole environment.
//!
//! A pole is attached by an unactuated joint to a cart moving along a
//! frictionless track. The agent pushes the cart to the left (action 0) or
//! to the right (action 1) and receives a reward of 1 for every step the
//! pole stays upright. An episode terminates when the pole leans more than
//! 12 degrees or the cart leaves the track, and is truncated after
//! `max_episode_steps` steps.
//!
//! ```no_run
//! use rezero_cartpole_env::{CartPoleAct, CartPoleEnv, CartPoleEnvConfig};
//! use rezero_core::Env;
//!
//! let mut env = CartPoleEnv::build(&CartPoleEnvConfig::default(), 42).unwrap();
//! let _obs = env.reset().unwrap();
//! let (step, _) = env.step(&CartPoleAct(1)).unwrap();
//! assert_eq!(step.reward[0], 1.0);
//! ```
mod base;
mod config;
mod error;
mod tensor;
pub use base::{CartPoleAct, CartPoleEnv, CartPoleObs};
pub use config::CartPoleEnvConfig;
pub use error::CartPoleError;
pub use tensor::{ActBatch, ObsBatch};

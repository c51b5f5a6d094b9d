//! Evaluator running a fixed number of episodes.
use super::Evaluator;
use crate::{record::Record, Env, Policy};
use anyhow::Result;
use log::info;

/// Runs `n_episodes` episodes and reports the mean return as `eval_reward`.
///
/// Episode `i` starts from [`Env::reset_with_index`] with index `i`, so that
/// successive evaluations of a policy are comparable.
pub struct DefaultEvaluator<E: Env> {
    n_episodes: usize,
    env: E,
}

impl<E: Env> Evaluator<E> for DefaultEvaluator<E> {
    fn evaluate<P: Policy<E>>(&mut self, policy: &mut P) -> Result<Record> {
        let mut r_total = 0f32;

        for ix in 0..self.n_episodes {
            let mut prev_obs = self.env.reset_with_index(ix)?;
            let mut r_episode = 0f32;

            loop {
                let act = policy.sample(&prev_obs)?;
                let (step, _) = self.env.step(&act)?;
                r_episode += step.reward[0];
                if step.is_done() {
                    break;
                }
                prev_obs = step.obs;
            }

            info!("Evaluation episode {}, return = {}", ix, r_episode);
            r_total += r_episode;
        }

        Ok(Record::from_scalar(
            "eval_reward",
            r_total / self.n_episodes as f32,
        ))
    }
}

impl<E: Env> DefaultEvaluator<E> {
    /// Constructs a new [`DefaultEvaluator`] with an environment for evaluation.
    pub fn new(env: E, n_episodes: usize) -> Result<Self> {
        anyhow::ensure!(n_episodes > 0, "n_episodes must be positive");
        Ok(Self { n_episodes, env })
    }
}

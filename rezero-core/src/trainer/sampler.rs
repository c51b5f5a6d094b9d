//! Interaction of an agent and an environment.
use crate::{
    record::{Record, RecordValue::Scalar},
    Agent, Env, ExperienceBufferBase, ReplayBufferBase, StepProcessor,
};
use anyhow::Result;
use log::debug;
use std::time::SystemTime;

/// Performs environment steps with an agent and pushes transitions into a
/// replay buffer.
///
/// It also keeps track of episode returns. Records returned by
/// [`Sampler::sample_and_push`] contain the reward of the step as `reward`,
/// and at the end of an episode, its return as `total_reward` and the number
/// of completed episodes as `episodes`.
pub struct Sampler<E, P>
where
    E: Env,
    P: StepProcessor<E>,
{
    env: E,
    prev_obs: Option<E::Obs>,
    step_processor: P,
    episode_reward: f32,
    n_episodes: usize,
    n_env_steps_for_fps: usize,
    timer: SystemTime,
}

impl<E, P> Sampler<E, P>
where
    E: Env,
    P: StepProcessor<E>,
{
    /// Creates a sampler.
    pub fn new(env: E, step_processor: P) -> Self {
        Self {
            env,
            prev_obs: None,
            step_processor,
            episode_reward: 0.0,
            n_episodes: 0,
            n_env_steps_for_fps: 0,
            timer: SystemTime::now(),
        }
    }

    /// Samples an action, applies it to the environment and pushes the
    /// resulting transition into `buffer`.
    ///
    /// The environment is reset on the first call.
    pub fn sample_and_push<A, R>(&mut self, agent: &mut A, buffer: &mut R) -> Result<Record>
    where
        A: Agent<E, R>,
        R: ExperienceBufferBase<Item = P::Output> + ReplayBufferBase,
    {
        let prev_obs = match self.prev_obs.take() {
            Some(obs) => obs,
            None => {
                let obs = self.env.reset()?;
                self.step_processor.reset(obs.clone());
                obs
            }
        };

        let act = agent.sample(&prev_obs)?;
        let (step, mut record) = self.env.step_with_reset(&act)?;
        let is_done = step.is_done();
        let reward = step.reward[0];

        self.prev_obs = match is_done {
            true => step.init_obs.clone(),
            false => Some(step.obs.clone()),
        };

        let transition = self.step_processor.process(step)?;
        buffer.push(transition)?;

        self.n_env_steps_for_fps += 1;
        self.episode_reward += reward;
        record.insert("reward", Scalar(reward));

        if is_done {
            self.n_episodes += 1;
            debug!(
                "Episode {} finished, return = {}",
                self.n_episodes, self.episode_reward
            );
            record.insert("total_reward", Scalar(self.episode_reward));
            record.insert("episodes", Scalar(self.n_episodes as _));
            self.episode_reward = 0.0;
        }

        Ok(record)
    }

    /// Resets the counter of environment steps per second.
    pub fn reset_fps_counter(&mut self) {
        self.n_env_steps_for_fps = 0;
        self.timer = SystemTime::now();
    }

    /// Returns environment steps per second since the last call, then
    /// resets the counter.
    pub fn fps(&mut self) -> f32 {
        let secs = self
            .timer
            .elapsed()
            .map(|d| d.as_secs_f32())
            .unwrap_or_default();
        let fps = match secs > 0.0 {
            true => self.n_env_steps_for_fps as f32 / secs,
            false => 0.0,
        };
        self.reset_fps_counter();
        fps
    }
}

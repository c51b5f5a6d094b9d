//! Train [`Agent`].
mod config;
mod sampler;
use crate::{
    record::{
        AggregateRecorder, Record,
        RecordValue::{DateTime, Scalar},
    },
    Agent, Env, Evaluator, ExperienceBufferBase, ReplayBufferBase, StepProcessor,
};
use anyhow::{ensure, Result};
use chrono::Local;
pub use config::TrainerConfig;
use log::{debug, info, warn};
pub use sampler::Sampler;
use std::{
    path::Path,
    time::{Duration, SystemTime},
};

#[inline]
fn is_multiple(step: usize, interval: usize) -> bool {
    interval > 0 && step % interval == 0
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Manages the training loop.
///
/// # Training loop
///
/// 1. Reset counters `env_steps = 0` and `opt_steps = 0`.
/// 2. Do an environment step with the agent and push the transition to the
///    replay buffer, then `env_steps += 1`.
/// 3. While `env_steps <= warmup_period`, go back to 2. These steps fill the
///    replay buffer; the agent acts uniformly at random before its first
///    optimization step.
/// 4. If `env_steps % opt_interval == 0`, do an optimization step. The agent
///    may skip it, for example when the buffer has fewer transitions than
///    it needs. Otherwise `opt_steps += 1` and:
///     * if `opt_steps % eval_interval == 0`, evaluate the agent, record
///       `eval_reward` with a `timestamp` and save the best model in
///       `(model_dir)/best`,
///     * if `opt_steps % record_compute_cost_interval == 0`, record `fps`
///       and `opt_steps_per_sec`,
///     * if `opt_steps % save_interval == 0`, save the model in
///       `(model_dir)/(opt_steps)`,
///     * if `opt_steps % flush_record_interval == 0`, flush the recorder,
///     * if `opt_steps == max_opts`, finish.
/// 5. Go back to 2.
///
/// # Interaction of objects
///
/// ```mermaid
/// graph LR
///     A[Agent]-->|Env::Act|B[Env]
///     B -->|Env::Obs|A
///     B -->|"Step&lt;E: Env&gt;"|C[StepProcessor]
///     C -->|ExperienceBufferBase::Item|D[ReplayBuffer]
///     D -->|ReplayBufferBase::Batch|A
/// ```
pub struct Trainer {
    config: TrainerConfig,

    /// Optimization steps for computing optimization steps per second.
    opt_steps_for_ops: usize,

    /// Timer for computing optimization steps per second.
    timer_for_ops: Duration,

    /// The best evaluation reward so far.
    max_eval_reward: f32,
}

impl Trainer {
    /// Constructs a trainer.
    pub fn build(config: TrainerConfig) -> Self {
        Self {
            config,
            opt_steps_for_ops: 0,
            timer_for_ops: Duration::new(0, 0),
            max_eval_reward: f32::MIN,
        }
    }

    fn save_model<E, A, R>(agent: &A, model_dir: &Path)
    where
        E: Env,
        A: Agent<E, R>,
        R: ReplayBufferBase,
    {
        match agent.save_params(model_dir) {
            Ok(()) => info!("Saved the model in {:?}", model_dir),
            Err(e) => warn!("Failed to save the model in {:?}: {}", model_dir, e),
        }
    }

    /// Returns optimization steps per second, then reset the internal counter.
    fn opt_steps_per_sec(&mut self) -> f32 {
        let osps = self.opt_steps_for_ops as f32 / self.timer_for_ops.as_secs_f32().max(1e-6);
        self.opt_steps_for_ops = 0;
        self.timer_for_ops = Duration::new(0, 0);
        osps
    }

    /// Performs a training step.
    ///
    /// First, it performs an environment step and pushes a transition into
    /// the buffer with [`Sampler`]. Then, after the warmup period and at every
    /// `opt_interval` environment steps, it performs an optimization step.
    ///
    /// The second value in the returned tuple is `true` if an optimization
    /// step was done.
    pub fn train_step<E, P, A, R>(
        &mut self,
        agent: &mut A,
        buffer: &mut R,
        sampler: &mut Sampler<E, P>,
        env_steps: &mut usize,
        opt_steps: &mut usize,
    ) -> Result<(Record, bool)>
    where
        E: Env,
        P: StepProcessor<E>,
        A: Agent<E, R>,
        R: ExperienceBufferBase<Item = P::Output> + ReplayBufferBase,
    {
        let record = sampler.sample_and_push(agent, buffer)?;
        *env_steps += 1;

        if *env_steps <= self.config.warmup_period
            || !is_multiple(*env_steps, self.config.opt_interval)
        {
            return Ok((record, false));
        }

        let timer = SystemTime::now();
        match agent.opt(buffer)? {
            Some(record_agent) => {
                *opt_steps += 1;
                self.timer_for_ops += timer.elapsed()?;
                self.opt_steps_for_ops += 1;
                Ok((record.merge(record_agent), true))
            }
            None => Ok((record, false)),
        }
    }

    /// Evaluates the agent and saves it if it is the best so far.
    fn evaluate<E, A, R, D>(&mut self, agent: &mut A, evaluator: &mut D) -> Result<Record>
    where
        E: Env,
        A: Agent<E, R>,
        R: ReplayBufferBase,
        D: Evaluator<E>,
    {
        info!("Starts evaluation of the trained model");
        agent.eval();
        let record = evaluator.evaluate(agent);
        agent.train();
        let mut record = record?;
        let eval_reward = record.get_scalar("eval_reward")?;
        record.insert("timestamp", DateTime(Local::now()));
        info!("Evaluation reward = {}", eval_reward);

        if eval_reward > self.max_eval_reward {
            self.max_eval_reward = eval_reward;
            if let Some(model_dir) = &self.config.model_dir {
                Self::save_model::<E, A, R>(agent, &Path::new(model_dir).join("best"));
            }
        }

        Ok(record)
    }

    /// Train the agent.
    ///
    /// `env` and `step_proc` are moved into a [`Sampler`] for the duration of
    /// the training.
    pub fn train<E, P, A, R, D>(
        &mut self,
        env: E,
        step_proc: P,
        agent: &mut A,
        buffer: &mut R,
        recorder: &mut dyn AggregateRecorder,
        evaluator: &mut D,
    ) -> Result<()>
    where
        E: Env,
        P: StepProcessor<E>,
        A: Agent<E, R>,
        R: ExperienceBufferBase<Item = P::Output> + ReplayBufferBase,
        D: Evaluator<E>,
    {
        let mut sampler = Sampler::new(env, step_proc);
        let mut env_steps: usize = 0;
        let mut opt_steps: usize = 0;
        sampler.reset_fps_counter();
        agent.train();

        if self.config.max_opts == 0 {
            warn!("max_opts is 0, training is skipped");
            return Ok(());
        }
        ensure!(
            self.config.opt_interval > 0,
            "opt_interval must be positive, training would never optimize"
        );
        info!(
            "Starts training: warmup_period = {}, max_opts = {}",
            self.config.warmup_period, self.config.max_opts
        );

        loop {
            let (mut record, is_opt) =
                self.train_step(agent, buffer, &mut sampler, &mut env_steps, &mut opt_steps)?;

            if env_steps == self.config.warmup_period {
                info!("Finished warmup, {} transitions in the buffer", buffer.len());
            }

            if is_opt {
                debug!("opt_steps = {}, env_steps = {}", opt_steps, env_steps);
                record.insert("opt_steps", Scalar(opt_steps as _));

                if is_multiple(opt_steps, self.config.record_compute_cost_interval) {
                    record.insert("fps", Scalar(sampler.fps()));
                    record.insert("opt_steps_per_sec", Scalar(self.opt_steps_per_sec()));
                }

                if is_multiple(opt_steps, self.config.eval_interval) {
                    let record_eval = self.evaluate::<E, A, R, D>(agent, evaluator)?;
                    record.merge_inplace(record_eval);
                }

                if is_multiple(opt_steps, self.config.save_interval) {
                    if let Some(model_dir) = &self.config.model_dir {
                        let path = Path::new(model_dir).join(opt_steps.to_string());
                        Self::save_model::<E, A, R>(agent, &path);
                    }
                }
            }

            if !record.is_empty() {
                recorder.store(record);
            }

            if is_opt {
                if is_multiple(opt_steps, self.config.flush_record_interval) {
                    recorder.flush(opt_steps as _);
                }

                if opt_steps >= self.config.max_opts {
                    break;
                }
            }
        }

        info!(
            "Finished training: {} env steps, {} optimization steps",
            env_steps, opt_steps
        );

        Ok(())
    }

    /// Returns the best evaluation reward observed during training.
    pub fn max_eval_reward(&self) -> Option<f32> {
        match self.max_eval_reward == f32::MIN {
            true => None,
            false => Some(self.max_eval_reward),
        }
    }
}

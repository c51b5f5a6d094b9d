//! Conversion of environment steps into 1-step transitions.
use super::{BatchBase, GenericTransitionBatch};
use crate::{error::RezeroError, Env, Obs, Step, StepProcessor};
use anyhow::Result;
use std::{default::Default, marker::PhantomData};

/// Configuration of [`SimpleStepProcessor`].
#[derive(Clone, Debug, Default)]
pub struct SimpleStepProcessorConfig {}

/// Creates transitions `(o_t, a_t, o_t+1, r_t, is_terminated_t, is_truncated_t)`.
///
/// `o_t` is kept from the previous call. When a step ends the episode, the
/// initial observation of the next episode becomes the next `o_t`.
///
/// Observations and actions are converted into `O` and `A` with [`TryFrom`].
pub struct SimpleStepProcessor<E: Env, O, A> {
    prev_obs: Option<E::Obs>,
    phantom: PhantomData<(O, A)>,
}

impl<E, O, A> StepProcessor<E> for SimpleStepProcessor<E, O, A>
where
    E: Env,
    O: BatchBase + TryFrom<E::Obs>,
    A: BatchBase + TryFrom<E::Act>,
    <O as TryFrom<E::Obs>>::Error: Into<anyhow::Error>,
    <A as TryFrom<E::Act>>::Error: Into<anyhow::Error>,
{
    type Config = SimpleStepProcessorConfig;
    type Output = GenericTransitionBatch<O, A>;

    fn build(_config: &Self::Config) -> Self {
        Self {
            prev_obs: None,
            phantom: PhantomData,
        }
    }

    fn reset(&mut self, init_obs: E::Obs) {
        self.prev_obs = Some(init_obs);
    }

    fn process(&mut self, step: Step<E>) -> Result<Self::Output> {
        debug_assert_eq!(step.obs.len(), 1);

        let is_done = step.is_done();
        let obs = self
            .prev_obs
            .replace(step.obs.clone())
            .ok_or(RezeroError::StepProcessorNotReset)?;

        if is_done {
            let init_obs = step.init_obs.ok_or(RezeroError::MissingInitObs)?;
            self.prev_obs.replace(init_obs);
        }

        Ok(GenericTransitionBatch {
            obs: O::try_from(obs).map_err(Into::into)?,
            act: A::try_from(step.act).map_err(Into::into)?,
            next_obs: O::try_from(step.obs).map_err(Into::into)?,
            reward: step.reward,
            is_terminated: step.is_terminated,
            is_truncated: step.is_truncated,
        })
    }
}

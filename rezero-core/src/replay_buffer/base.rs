//! Simple generic replay buffer.
use super::{BatchBase, GenericTransitionBatch, SimpleReplayBufferConfig};
use crate::{error::RezeroError, ExperienceBufferBase, ReplayBufferBase, TransitionBatch};
use anyhow::Result;
use rand::{rngs::StdRng, seq::index, SeedableRng};

/// A bounded FIFO replay buffer.
///
/// Transitions are written at a cursor that wraps around at `capacity`, so
/// that a full buffer drops its oldest transition on each push.
/// [`ReplayBufferBase::batch`] samples distinct indices uniformly at random.
pub struct SimpleReplayBuffer<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    capacity: usize,
    i: usize,
    size: usize,
    obs: O,
    act: A,
    next_obs: O,
    reward: Vec<f32>,
    is_terminated: Vec<i8>,
    is_truncated: Vec<i8>,
    rng: StdRng,
}

impl<O, A> SimpleReplayBuffer<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    #[inline]
    fn push_vec<T: Copy>(buf: &mut [T], i: usize, data: &[T]) {
        let capacity = buf.len();
        for (j, v) in data.iter().enumerate() {
            buf[(i + j) % capacity] = *v;
        }
    }

    fn sample_vec<T: Copy>(buf: &[T], ixs: &[usize]) -> Vec<T> {
        ixs.iter().map(|ix| buf[*ix]).collect()
    }

    /// Returns the capacity of the buffer.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<O, A> ExperienceBufferBase for SimpleReplayBuffer<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    type Item = GenericTransitionBatch<O, A>;

    fn len(&self) -> usize {
        self.size
    }

    fn push(&mut self, tr: Self::Item) -> Result<()> {
        let len = tr.len();
        let (obs, act, next_obs, reward, is_terminated, is_truncated) = tr.unpack();
        self.obs.push(self.i, obs)?;
        self.act.push(self.i, act)?;
        self.next_obs.push(self.i, next_obs)?;
        Self::push_vec(&mut self.reward, self.i, &reward);
        Self::push_vec(&mut self.is_terminated, self.i, &is_terminated);
        Self::push_vec(&mut self.is_truncated, self.i, &is_truncated);

        self.i = (self.i + len) % self.capacity;
        self.size = (self.size + len).min(self.capacity);

        Ok(())
    }
}

impl<O, A> ReplayBufferBase for SimpleReplayBuffer<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    type Config = SimpleReplayBufferConfig;
    type Batch = GenericTransitionBatch<O, A>;

    fn build(config: &Self::Config) -> Self {
        let capacity = config.capacity;

        Self {
            capacity,
            i: 0,
            size: 0,
            obs: O::new(capacity),
            act: A::new(capacity),
            next_obs: O::new(capacity),
            reward: vec![0.; capacity],
            is_terminated: vec![0; capacity],
            is_truncated: vec![0; capacity],
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    fn batch(&mut self, size: usize) -> Result<Self::Batch> {
        if self.size == 0 {
            return Err(RezeroError::EmptyReplayBuffer.into());
        }

        if size > self.size {
            return Err(RezeroError::BatchLargerThanBuffer {
                batch_size: size,
                len: self.size,
            }
            .into());
        }

        let ixs = index::sample(&mut self.rng, self.size, size).into_vec();

        Ok(Self::Batch {
            obs: self.obs.sample(&ixs)?,
            act: self.act.sample(&ixs)?,
            next_obs: self.next_obs.sample(&ixs)?,
            reward: Self::sample_vec(&self.reward, &ixs),
            is_terminated: Self::sample_vec(&self.is_terminated, &ixs),
            is_truncated: Self::sample_vec(&self.is_truncated, &ixs),
        })
    }
}

//! Transition batches.
use crate::TransitionBatch;
use anyhow::Result;

/// Storage of one field of transitions, like observations or actions.
///
/// Implementations keep a buffer of `capacity` elements along the first axis.
pub trait BatchBase {
    /// Builds a storage with a capacity.
    fn new(capacity: usize) -> Self;

    /// Writes the elements in `data` starting from index `ix`.
    ///
    /// Elements beyond the capacity wrap around to the beginning.
    fn push(&mut self, ix: usize, data: Self) -> Result<()>;

    /// Takes the elements at the given indices.
    fn sample(&self, ixs: &[usize]) -> Result<Self>
    where
        Self: Sized;
}

/// A batch of transitions, generic over the storage of observations and actions.
pub struct GenericTransitionBatch<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    /// Observations.
    pub obs: O,

    /// Actions.
    pub act: A,

    /// Next observations.
    pub next_obs: O,

    /// Rewards.
    pub reward: Vec<f32>,

    /// Termination flags.
    pub is_terminated: Vec<i8>,

    /// Truncation flags.
    pub is_truncated: Vec<i8>,
}

impl<O, A> TransitionBatch for GenericTransitionBatch<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    type ObsBatch = O;
    type ActBatch = A;

    fn unpack(
        self,
    ) -> (
        Self::ObsBatch,
        Self::ActBatch,
        Self::ObsBatch,
        Vec<f32>,
        Vec<i8>,
        Vec<i8>,
    ) {
        (
            self.obs,
            self.act,
            self.next_obs,
            self.reward,
            self.is_terminated,
            self.is_truncated,
        )
    }

    fn len(&self) -> usize {
        self.reward.len()
    }
}

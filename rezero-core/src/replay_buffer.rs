//! Bounded FIFO replay buffer with uniform sampling.
//!
//! * [`SimpleReplayBuffer`] stores transitions in ring buffers of a fixed
//!   capacity; once full, the oldest transition is overwritten.
//! * [`GenericTransitionBatch`] is both the item pushed into the buffer and
//!   the batch sampled from it.
//! * [`SimpleStepProcessor`] turns environment steps into 1-step transitions.
//!
//! The storage of observations and actions is abstracted by [`BatchBase`],
//! so that a tensor backend can keep them in its own format.
mod base;
mod batch;
mod config;
mod step_proc;
pub use base::SimpleReplayBuffer;
pub use batch::{BatchBase, GenericTransitionBatch};
pub use config::SimpleReplayBufferConfig;
pub use step_proc::{SimpleStepProcessor, SimpleStepProcessorConfig};

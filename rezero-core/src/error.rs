//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug, PartialEq)]
pub enum RezeroError {
    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),

    /// A batch was requested from a replay buffer holding no transitions.
    #[error("Cannot sample a batch from an empty replay buffer")]
    EmptyReplayBuffer,

    /// A batch larger than the number of stored transitions was requested.
    #[error("Cannot sample {batch_size} distinct transitions from {len} stored ones")]
    BatchLargerThanBuffer {
        /// Requested batch size.
        batch_size: usize,
        /// Number of transitions in the buffer.
        len: usize,
    },

    /// A step was processed before the step processor got an initial observation.
    #[error("Step processor is not reset, the previous observation is missing")]
    StepProcessorNotReset,

    /// An environment step ended an episode but no initial observation was given.
    #[error("Episode ended without an initial observation of the next episode")]
    MissingInitObs,
}

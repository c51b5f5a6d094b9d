//! Errors of the candle agent.
use thiserror::Error;

/// Errors raised by the agent and its models.
#[derive(Error, Debug, PartialEq)]
pub enum AgentError {
    /// The configuration of the Q-network is missing.
    #[error("q_config is not set")]
    MissingQConfig,

    /// A lock on the parameters of a model was poisoned.
    #[error("parameters of the model are not accessible")]
    PoisonedVarMap,

    /// A parameter of the target network has no counterpart in the source.
    #[error("parameter {0} is not found in the source network")]
    MissingParameter(String),

    /// A gradient step was requested on a model built without an optimizer.
    #[error("model has no optimizer")]
    MissingOptimizer,

    /// The tensor batch has no data.
    #[error("tensor batch is empty")]
    EmptyTensorBatch,
}

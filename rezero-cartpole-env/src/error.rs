use thiserror::Error;

/// Errors of [`CartPoleEnv`](crate::CartPoleEnv).
#[derive(Error, Debug, PartialEq)]
pub enum CartPoleError {
    /// The action is neither 0 nor 1.
    #[error("invalid action {0}, expected 0 or 1")]
    InvalidAction(i64),

    /// The environment was stepped before reset or after the episode ended.
    #[error("the episode has ended or not started, reset the environment")]
    NeedsReset,

    /// A tensor holding no action was converted into an action.
    #[error("the tensor holds no action")]
    EmptyAction,
}

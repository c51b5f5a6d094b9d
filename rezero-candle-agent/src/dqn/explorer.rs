//! Exploration strategy of DQN.
use anyhow::Result;
use candle_core::{shape::D, DType, Tensor};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Epsilon-greedy explorer for DQN.
///
/// Epsilon decays linearly in the number of optimization steps, from
/// `eps_start` at step 0 to `eps_final` at `final_step`, and stays at
/// `eps_final` afterwards.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EpsilonGreedy {
    /// Epsilon at the first optimization step.
    pub eps_start: f64,

    /// Epsilon after `final_step` optimization steps.
    pub eps_final: f64,

    /// Number of optimization steps over which epsilon decays.
    pub final_step: usize,
}

impl Default for EpsilonGreedy {
    fn default() -> Self {
        Self {
            eps_start: 1.0,
            eps_final: 0.01,
            final_step: 1000,
        }
    }
}

impl EpsilonGreedy {
    /// Constructs epsilon-greedy explorer with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs epsilon-greedy explorer decaying over `final_step` steps.
    pub fn with_final_step(final_step: usize) -> Self {
        Self {
            final_step,
            ..Self::default()
        }
    }

    /// Returns epsilon after `step` optimization steps.
    pub fn eps(&self, step: usize) -> f64 {
        if step >= self.final_step {
            return self.eps_final;
        }
        let d = (self.eps_start - self.eps_final) / self.final_step as f64;
        (self.eps_start - d * step as f64).max(self.eps_final)
    }

    /// Takes an action based on action values `a` of shape
    /// `(n_samples, n_actions)`, returns `i64` tensor of shape `(n_samples,)`.
    ///
    /// With probability `eps` an action is drawn uniformly from all actions,
    /// otherwise the greedy action is taken.
    pub fn action(&self, a: &Tensor, eps: f64, rng: &mut impl Rng) -> Result<Tensor> {
        if rng.gen::<f64>() < eps {
            let (n_samples, n_actions) = a.dims2()?;
            let act = (0..n_samples)
                .map(|_| rng.gen_range(0..n_actions as i64))
                .collect::<Vec<_>>();
            Ok(Tensor::from_vec(act, (n_samples,), a.device())?)
        } else {
            greedy(a)
        }
    }

    /// Set the epsilon value at the start.
    pub fn eps_start(mut self, v: f64) -> Self {
        self.eps_start = v;
        self
    }

    /// Set the epsilon value at the final step.
    pub fn eps_final(mut self, v: f64) -> Self {
        self.eps_final = v;
        self
    }

    /// Set the number of optimization steps over which epsilon decays.
    pub fn final_step(mut self, v: usize) -> Self {
        self.final_step = v;
        self
    }
}

/// Returns the actions maximizing the action values `a`, as an `i64` tensor.
pub(super) fn greedy(a: &Tensor) -> Result<Tensor> {
    Ok(a.argmax(D::Minus1)?.to_dtype(DType::I64)?)
}

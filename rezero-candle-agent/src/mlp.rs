//! Multilayer perceptron.
mod base;
mod config;
use anyhow::Result;
pub use base::Mlp;
use candle_core::Tensor;
use candle_nn::{Linear, Module};
pub use config::MlpConfig;

/// Applies the layers with ReLU between them, none after the last one.
fn mlp_forward(xs: Tensor, layers: &[Linear]) -> Result<Tensor> {
    let mut xs = xs;
    if let Some((last, hidden)) = layers.split_last() {
        for layer in hidden {
            xs = layer.forward(&xs)?.relu()?;
        }
        xs = last.forward(&xs)?;
    }
    Ok(xs)
}

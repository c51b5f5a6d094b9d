use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use rezero::{eval, train, RezeroConfig};
use rezero_candle_agent::{dqn::EpsilonGreedy, opt::OptimizerConfig};
use rezero_tensorboard::TensorboardRecorder;
use std::path::Path;

/// Train/eval DQN agent in cartpole environment
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// YAML file of the whole configuration, overriding the other options
    #[arg(long)]
    config: Option<String>,

    /// Saves the resolved configuration as a YAML file and exits
    #[arg(long)]
    dump_config: Option<String>,

    /// Evaluate the best saved model, not train
    #[arg(short, long, default_value_t = false)]
    eval: bool,

    /// Directory of saved models and TensorBoard logs
    #[arg(long, default_value = "./model/dqn_cartpole")]
    model_dir: String,

    /// Size of the batches
    #[arg(long, default_value_t = 16)]
    batch_size: usize,

    /// Learning rate
    #[arg(long, default_value_t = 1e-2)]
    lr: f64,

    /// Discount factor
    #[arg(long, default_value_t = 0.99)]
    gamma: f64,

    /// How many optimization steps between target network updates
    #[arg(long, default_value_t = 10)]
    sync_rate: usize,

    /// Capacity of the replay buffer
    #[arg(long, default_value_t = 1000)]
    replay_size: usize,

    /// Random steps filling the replay buffer before training
    #[arg(long, default_value_t = 1000)]
    warm_start_steps: usize,

    /// Optimization step at which epsilon stops decaying
    #[arg(long, default_value_t = 1000)]
    eps_last_frame: usize,

    /// Starting value of epsilon
    #[arg(long, default_value_t = 1.0)]
    eps_start: f64,

    /// Final value of epsilon
    #[arg(long, default_value_t = 0.01)]
    eps_end: f64,

    /// Max length of an episode
    #[arg(long, default_value_t = 200)]
    episode_length: usize,

    /// Number of optimization steps
    #[arg(long, default_value_t = 10_000)]
    max_opts: usize,

    /// Interval of evaluation in optimization steps
    #[arg(long, default_value_t = 1000)]
    eval_interval: usize,

    /// Random seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn create_config(args: &Args) -> Result<RezeroConfig> {
    if let Some(path) = &args.config {
        info!("Load configuration from {}", path);
        return RezeroConfig::load(path);
    }

    let mut config = RezeroConfig::default();
    config.env_config = config.env_config.max_episode_steps(args.episode_length);
    config.agent_config = config
        .agent_config
        .batch_size(args.batch_size)
        .min_transitions_warmup(args.batch_size)
        .discount_factor(args.gamma)
        .sync_interval(args.sync_rate)
        .explorer(
            EpsilonGreedy::new()
                .eps_start(args.eps_start)
                .eps_final(args.eps_end)
                .final_step(args.eps_last_frame),
        )
        .seed(args.seed);
    config.agent_config.model_config = config
        .agent_config
        .model_config
        .opt_config(OptimizerConfig::Adam { lr: args.lr });
    config.replay_buffer_config = config
        .replay_buffer_config
        .capacity(args.replay_size)
        .seed(args.seed);
    config.trainer_config = config
        .trainer_config
        .max_opts(args.max_opts)
        .warmup_period(args.warm_start_steps)
        .eval_interval(args.eval_interval)
        .model_dir(args.model_dir.clone());
    config.seed = args.seed as i64;

    Ok(config)
}

fn run(args: &Args) -> Result<()> {
    let config = create_config(args)?;

    if let Some(path) = &args.dump_config {
        config.save(path)?;
        info!("Saved configuration to {}", path);
        return Ok(());
    }

    let model_dir = config.model_dir().unwrap_or(&args.model_dir).to_string();
    let best = Path::new(&model_dir).join("best");
    if args.eval {
        eval(&config, &best)?;
        return Ok(());
    }

    let mut recorder = TensorboardRecorder::new(&model_dir);
    let max_eval_reward = train(&config, &mut recorder)?;
    info!("Best evaluation reward: {:?}", max_eval_reward);
    match best.exists() {
        true => {
            eval(&config, &best)?;
        }
        false => warn!("No model saved in {:?}, evaluation is skipped", best),
    }

    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    run(&Args::parse())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_default_args_match_default_config() -> Result<()> {
        let args = Args::parse_from(["rezero"]);
        let config = create_config(&args)?;
        assert_eq!(config, RezeroConfig::default());

        Ok(())
    }

    #[test]
    fn test_args_override_hyperparameters() -> Result<()> {
        let args = Args::parse_from([
            "rezero",
            "--batch-size",
            "32",
            "--lr",
            "0.001",
            "--sync-rate",
            "5",
            "--eps-last-frame",
            "500",
            "--episode-length",
            "100",
        ]);
        let config = create_config(&args)?;
        assert_eq!(config.agent_config.batch_size, 32);
        assert_eq!(config.agent_config.sync_interval, 5);
        assert_eq!(config.agent_config.explorer.final_step, 500);
        assert_eq!(config.env_config.max_episode_steps, 100);
        assert_eq!(
            config.agent_config.model_config,
            RezeroConfig::default()
                .agent_config
                .model_config
                .opt_config(OptimizerConfig::Adam { lr: 1e-3 })
        );

        Ok(())
    }

    #[test]
    fn test_run_without_saved_model() -> Result<()> {
        let dir = TempDir::new("rezero_run")?;
        let model_dir = dir.path().to_string_lossy().to_string();

        // Nothing is trained, so evaluation after training is skipped.
        let args = Args::parse_from([
            "rezero",
            "--max-opts",
            "0",
            "--model-dir",
            model_dir.as_str(),
        ]);
        run(&args)?;
        assert!(!dir.path().join("best").exists());

        // Evaluation alone needs a saved model.
        let args = Args::parse_from(["rezero", "--eval", "--model-dir", model_dir.as_str()]);
        assert!(run(&args).is_err());

        Ok(())
    }
}

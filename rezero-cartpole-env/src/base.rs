use crate::{CartPoleEnvConfig, CartPoleError};
use anyhow::Result;
use log::trace;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rezero_core::{record::Record, Act, Env, Obs, Step};

/// Observation `[x, x_dot, theta, theta_dot]` of [`CartPoleEnv`].
#[derive(Clone, Debug, PartialEq)]
pub struct CartPoleObs(pub [f32; 4]);

impl Obs for CartPoleObs {}

/// Action of [`CartPoleEnv`], 0 pushes the cart to the left and 1 to the right.
#[derive(Clone, Debug, PartialEq)]
pub struct CartPoleAct(pub i64);

impl Act for CartPoleAct {}

/// Classic cart-pole system, integrated with the Euler method.
pub struct CartPoleEnv {
    config: CartPoleEnvConfig,
    seed: i64,
    rng: StdRng,
    state: [f64; 4],
    n_steps: usize,
    needs_reset: bool,
}

impl CartPoleEnv {
    fn obs(&self) -> CartPoleObs {
        CartPoleObs(self.state.map(|v| v as f32))
    }

    /// Advances the state by one time step under the force of the action.
    fn integrate(&mut self, act: i64) {
        let c = &self.config;
        let [x, x_dot, theta, theta_dot] = self.state;
        let force = match act {
            1 => c.force_mag,
            _ => -c.force_mag,
        };
        let (sin_theta, cos_theta) = theta.sin_cos();
        let total_mass = c.mass_cart + c.mass_pole;
        let pole_mass_length = c.mass_pole * c.length;

        let temp = (force + pole_mass_length * theta_dot.powi(2) * sin_theta) / total_mass;
        let theta_acc = (c.gravity * sin_theta - cos_theta * temp)
            / (c.length * (4.0 / 3.0 - c.mass_pole * cos_theta.powi(2) / total_mass));
        let x_acc = temp - pole_mass_length * theta_acc * cos_theta / total_mass;

        self.state = [
            x + c.tau * x_dot,
            x_dot + c.tau * x_acc,
            theta + c.tau * theta_dot,
            theta_dot + c.tau * theta_acc,
        ];
    }

    fn is_terminated(&self) -> bool {
        let [x, _, theta, _] = self.state;
        x.abs() > self.config.x_threshold || theta.abs() > self.config.theta_threshold
    }

    /// Returns the number of steps in the current episode.
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }
}

impl Env for CartPoleEnv {
    type Config = CartPoleEnvConfig;
    type Obs = CartPoleObs;
    type Act = CartPoleAct;
    type Info = ();

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            seed,
            rng: StdRng::seed_from_u64(seed as u64),
            state: [0.0; 4],
            n_steps: 0,
            needs_reset: true,
        })
    }

    fn step(&mut self, a: &Self::Act) -> Result<(Step<Self>, Record)> {
        if a.0 != 0 && a.0 != 1 {
            return Err(CartPoleError::InvalidAction(a.0).into());
        }
        if self.needs_reset {
            return Err(CartPoleError::NeedsReset.into());
        }

        self.integrate(a.0);
        self.n_steps += 1;

        let is_terminated = self.is_terminated();
        let is_truncated = self.n_steps >= self.config.max_episode_steps;
        self.needs_reset = is_terminated || is_truncated;
        trace!(
            "step {}: state = {:?}, terminated = {}, truncated = {}",
            self.n_steps,
            self.state,
            is_terminated,
            is_truncated
        );

        let step = Step::new(
            self.obs(),
            a.clone(),
            vec![1.0],
            vec![is_terminated as i8],
            vec![is_truncated as i8],
            (),
            None,
        );

        Ok((step, Record::empty()))
    }

    fn reset(&mut self) -> Result<Self::Obs> {
        let rng = &mut self.rng;
        self.state = [(); 4].map(|_| rng.gen_range(-0.05..0.05));
        self.n_steps = 0;
        self.needs_reset = false;
        Ok(self.obs())
    }

    fn step_with_reset(&mut self, a: &Self::Act) -> Result<(Step<Self>, Record)> {
        let (mut step, record) = self.step(a)?;
        if step.is_done() {
            step.init_obs = Some(self.reset()?);
        }
        Ok((step, record))
    }

    /// Reseeds the random number generator with `seed + ix` and resets.
    fn reset_with_index(&mut self, ix: usize) -> Result<Self::Obs> {
        self.rng = StdRng::seed_from_u64((self.seed + ix as i64) as u64);
        self.reset()
    }
}

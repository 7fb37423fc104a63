use crate::{
    action::ActionConverter,
    game::{BuiltinGame, RawEnv},
    spec::{EnvSpec, spec_for_name},
};
use anyhow::{Result, anyhow, ensure};
use reel_core::{Action, Env, EnvironmentDescription, Frame, Space, Transition};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Simulated frames per second; each step advances the clock by `1 / fps`.
    pub fps: u32,
    /// Episodes are cut off after this many steps. `0` disables the limit.
    pub max_timesteps: usize,
    pub reward_scale: Option<f32>,
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fps: 10,
            max_timesteps: 3000,
            reward_scale: None,
            seed: 0,
        }
    }
}

/// Adapts a [`RawEnv`] to the [`Env`] interface: converts discrete actions
/// into input events, runs the game clock and enforces the time limit.
pub struct SimEnv<R: RawEnv> {
    raw: R,
    converter: Box<dyn ActionConverter>,
    spec: EnvSpec,
    frame_time: Duration,
    max_timesteps: usize,
    reward_scale: Option<f32>,
    timestep: usize,
}

impl<R: RawEnv> SimEnv<R> {
    pub fn new(raw: R, spec: EnvSpec, config: &SimConfig) -> Result<Self> {
        ensure!(config.fps > 0, "fps must be positive");
        Ok(Self {
            raw,
            converter: spec.action_converter(),
            spec,
            frame_time: Duration::from_secs(1) / config.fps,
            max_timesteps: config.max_timesteps,
            reward_scale: config.reward_scale,
            timestep: 0,
        })
    }

    pub fn spec(&self) -> &EnvSpec {
        &self.spec
    }

    pub fn timestep(&self) -> usize {
        self.timestep
    }

    fn check_frame(&self, frame: &Frame) -> Result<()> {
        ensure!(
            frame.shape() == [self.spec.height, self.spec.width, 3],
            "{} rendered a {:?} frame, expected {}x{}",
            self.spec.name,
            frame.shape(),
            self.spec.height,
            self.spec.width
        );
        Ok(())
    }
}

/// Builds the built-in game registered under `name`.
pub fn make_env(name: &str, config: &SimConfig) -> Result<SimEnv<BuiltinGame>> {
    let spec = spec_for_name(name).ok_or_else(|| anyhow!("unknown environment: {name}"))?;
    let game = BuiltinGame::for_spec(&spec, config.seed);
    SimEnv::new(game, spec, config)
}

impl<R: RawEnv> Env for SimEnv<R> {
    fn reset(&mut self) -> Result<Frame> {
        self.timestep = 0;
        self.converter.reset();
        self.raw.reset()?;
        let frame = self.raw.observe()?;
        self.check_frame(&frame)?;
        Ok(frame)
    }

    fn step(&mut self, action: Action) -> Result<Transition> {
        let events = self.converter.actions(action)?;
        let (reward, done) = self.raw.step(self.frame_time, &events)?;
        self.timestep += 1;
        let truncated = !done && self.max_timesteps > 0 && self.timestep >= self.max_timesteps;
        let observation = self.raw.observe()?;
        self.check_frame(&observation)?;
        tracing::trace!(timestep = self.timestep, action, reward, done, truncated);
        Ok(Transition {
            observation,
            reward: self.reward_scale.map_or(reward, |scale| reward * scale),
            done: done || truncated,
            truncated,
        })
    }

    fn env_description(&self) -> EnvironmentDescription {
        EnvironmentDescription::new(
            Space::Image {
                height: self.spec.height,
                width: self.spec.width,
                channels: 3,
            },
            self.converter.action_space(),
        )
    }
}

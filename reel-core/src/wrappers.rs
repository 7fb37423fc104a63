//! Decorators over [`BatchEnv`].
//!
//! The recording stack is `ObsInInfo` directly on top of the simulator handle,
//! with the observation transforms above it. The policy then sees downsampled,
//! stacked observations while each info record still carries the
//! full-resolution frame.

use crate::{
    env::{Action, BatchEnv, EnvironmentDescription, Space, StepResult},
    frame::Frame,
};
use anyhow::Result;
use std::collections::VecDeque;

/// Copies every observation into its info record as the raw frame.
pub struct ObsInInfo<E: BatchEnv> {
    env: E,
}

impl<E: BatchEnv> ObsInInfo<E> {
    pub fn new(env: E) -> Self {
        Self { env }
    }

    pub fn inner(&self) -> &E {
        &self.env
    }
}

impl<E: BatchEnv> BatchEnv for ObsInInfo<E> {
    fn num_envs(&self) -> usize {
        self.env.num_envs()
    }

    fn env_description(&self) -> EnvironmentDescription {
        self.env.env_description()
    }

    fn reset_start(&mut self) -> Result<()> {
        self.env.reset_start()
    }

    fn reset_wait(&mut self) -> Result<Vec<Frame>> {
        self.env.reset_wait()
    }

    fn step_start(&mut self, actions: &[Action]) -> Result<()> {
        self.env.step_start(actions)
    }

    fn step_wait(&mut self) -> Result<StepResult> {
        let mut result = self.env.step_wait()?;
        for (observation, info) in result.observations.iter().zip(result.infos.iter_mut()) {
            info.raw_frame = Some(observation.clone());
        }
        Ok(result)
    }

    fn close(self) -> Result<()> {
        self.env.close()
    }
}

/// Reduces observation resolution by keeping every `factor`-th pixel.
pub struct Downsample<E: BatchEnv> {
    env: E,
    factor: usize,
}

impl<E: BatchEnv> Downsample<E> {
    pub fn new(env: E, factor: usize) -> Self {
        Self {
            env,
            factor: factor.max(1),
        }
    }
}

impl<E: BatchEnv> BatchEnv for Downsample<E> {
    fn num_envs(&self) -> usize {
        self.env.num_envs()
    }

    fn env_description(&self) -> EnvironmentDescription {
        let mut description = self.env.env_description();
        if let Space::Image {
            height,
            width,
            channels,
        } = description.observation_space
        {
            description.observation_space = Space::Image {
                height: height.div_ceil(self.factor),
                width: width.div_ceil(self.factor),
                channels,
            };
        }
        description
    }

    fn reset_start(&mut self) -> Result<()> {
        self.env.reset_start()
    }

    fn reset_wait(&mut self) -> Result<Vec<Frame>> {
        let observations = self.env.reset_wait()?;
        Ok(observations
            .iter()
            .map(|obs| obs.downsample(self.factor))
            .collect())
    }

    fn step_start(&mut self, actions: &[Action]) -> Result<()> {
        self.env.step_start(actions)
    }

    fn step_wait(&mut self) -> Result<StepResult> {
        let mut result = self.env.step_wait()?;
        result.observations = result
            .observations
            .iter()
            .map(|obs| obs.downsample(self.factor))
            .collect();
        Ok(result)
    }

    fn close(self) -> Result<()> {
        self.env.close()
    }
}

/// Presents the last `depth` observations of each environment as one frame,
/// stacked along the channel axis, oldest first.
pub struct FrameStack<E: BatchEnv> {
    env: E,
    depth: usize,
    history: Vec<VecDeque<Frame>>,
}

impl<E: BatchEnv> FrameStack<E> {
    pub fn new(env: E, depth: usize) -> Self {
        Self {
            env,
            depth: depth.max(1),
            history: Vec::new(),
        }
    }

    fn refill(depth: usize, observation: &Frame) -> VecDeque<Frame> {
        std::iter::repeat_n(observation.clone(), depth).collect()
    }

    fn stacked(history: &VecDeque<Frame>) -> Result<Frame> {
        let frames: Vec<Frame> = history.iter().cloned().collect();
        Ok(Frame::concat_channels(&frames)?)
    }
}

impl<E: BatchEnv> BatchEnv for FrameStack<E> {
    fn num_envs(&self) -> usize {
        self.env.num_envs()
    }

    fn env_description(&self) -> EnvironmentDescription {
        let mut description = self.env.env_description();
        if let Space::Image {
            height,
            width,
            channels,
        } = description.observation_space
        {
            description.observation_space = Space::Image {
                height,
                width,
                channels: channels * self.depth,
            };
        }
        description
    }

    fn reset_start(&mut self) -> Result<()> {
        self.env.reset_start()
    }

    fn reset_wait(&mut self) -> Result<Vec<Frame>> {
        let observations = self.env.reset_wait()?;
        self.history = observations.iter().map(|obs| Self::refill(self.depth, obs)).collect();
        self.history.iter().map(Self::stacked).collect()
    }

    fn step_start(&mut self, actions: &[Action]) -> Result<()> {
        anyhow::ensure!(
            self.history.len() == self.env.num_envs(),
            "frame stack has no history for {} envs, was reset skipped?",
            self.env.num_envs()
        );
        self.env.step_start(actions)
    }

    fn step_wait(&mut self) -> Result<StepResult> {
        let mut result = self.env.step_wait()?;
        let outcomes = result.observations.iter().zip(&result.dones);
        for (history, (observation, done)) in self.history.iter_mut().zip(outcomes) {
            if *done {
                *history = Self::refill(self.depth, observation);
            } else {
                history.pop_front();
                history.push_back(observation.clone());
            }
        }
        result.observations = self
            .history
            .iter()
            .map(Self::stacked)
            .collect::<Result<_>>()?;
        Ok(result)
    }

    fn close(self) -> Result<()> {
        self.env.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedEnv;

    #[test]
    fn obs_in_info_adds_frames_without_touching_the_step() -> Result<()> {
        let (mut plain, _) = ScriptedEnv::new(4, 4, 3);
        let (augmented, _) = ScriptedEnv::new(4, 4, 3);
        let mut augmented = ObsInInfo::new(augmented);

        plain.reset_start()?;
        augmented.reset_start()?;
        assert_eq!(plain.reset_wait()?, augmented.reset_wait()?);

        plain.step_start(&[1])?;
        augmented.step_start(&[1])?;
        let expected = plain.step_wait()?;
        let actual = augmented.step_wait()?;

        assert_eq!(actual.observations, expected.observations);
        assert_eq!(actual.rewards, expected.rewards);
        assert_eq!(actual.dones, expected.dones);
        assert_eq!(
            actual.infos[0].raw_frame.as_ref(),
            Some(&expected.observations[0])
        );
        assert_eq!(actual.infos[0].truncated, expected.infos[0].truncated);
        Ok(())
    }

    #[test]
    fn raw_frame_survives_observation_transforms() -> Result<()> {
        let (env, _) = ScriptedEnv::new(3, 8, 8);
        let mut env = FrameStack::new(Downsample::new(ObsInInfo::new(env), 4), 4);
        assert_eq!(
            env.env_description().observation_space,
            Space::Image {
                height: 2,
                width: 2,
                channels: 12
            }
        );
        env.reset_start()?;
        let initial = env.reset_wait()?;
        assert_eq!(initial[0].shape(), [2, 2, 12]);

        env.step_start(&[0])?;
        let result = env.step_wait()?;
        assert_eq!(result.observations[0].shape(), [2, 2, 12]);
        let raw = result.infos[0].raw_frame.as_ref().unwrap();
        assert_eq!(raw.shape(), [8, 8, 3]);
        Ok(())
    }

    #[test]
    fn frame_stack_shifts_history() -> Result<()> {
        let (env, _) = ScriptedEnv::new(5, 1, 1);
        let mut env = FrameStack::new(env, 3);
        env.reset_start()?;
        let initial = env.reset_wait()?;
        // scripted frames hold the step index in every channel
        assert_eq!(initial[0].pixel(0, 0), &[0, 0, 0, 0, 0, 0, 0, 0, 0]);

        env.step_start(&[0])?;
        env.step_wait()?;
        env.step_start(&[0])?;
        let result = env.step_wait()?;
        assert_eq!(result.observations[0].pixel(0, 0), &[0, 0, 0, 1, 1, 1, 2, 2, 2]);
        Ok(())
    }

    #[test]
    fn frame_stack_rejects_a_step_before_reset() -> Result<()> {
        let (env, probe) = ScriptedEnv::new(5, 1, 1);
        let mut env = FrameStack::new(env, 2);
        assert!(env.step_start(&[0]).is_err());
        assert_eq!(probe.steps(), 0);

        env.reset_start()?;
        env.reset_wait()?;
        env.step_start(&[0])?;
        assert_eq!(env.step_wait()?.observations[0].shape(), [1, 1, 6]);
        Ok(())
    }
}

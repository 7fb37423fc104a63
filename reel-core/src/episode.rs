use crate::{
    env::{BatchEnv, StepResult},
    error::EpisodeError,
    frame::Frame,
    policy::PolicyRunner,
};
use anyhow::Result;
use std::iter::FusedIterator;

enum Stage<S> {
    Start,
    Running { observations: Vec<Frame>, states: S },
    Done,
}

/// Plays one episode lazily, yielding the raw frame of every step.
///
/// Nothing happens until the first pull. The final frame is the one whose
/// step reported `done`; after that, or after the first error, the iterator
/// is exhausted for good. Replaying needs a new producer.
pub struct EpisodeFrames<'a, E: BatchEnv, P: PolicyRunner> {
    env: &'a mut E,
    policy: &'a P,
    stage: Stage<P::State>,
    steps: usize,
}

impl<'a, E: BatchEnv, P: PolicyRunner> EpisodeFrames<'a, E, P> {
    pub fn new(env: &'a mut E, policy: &'a P) -> Self {
        Self {
            env,
            policy,
            stage: Stage::Start,
            steps: 0,
        }
    }

    /// Steps taken so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn is_done(&self) -> bool {
        matches!(self.stage, Stage::Done)
    }

    fn advance(&mut self) -> Result<Option<Frame>> {
        // Done until proven otherwise, so any early return ends the episode.
        let (observations, states) = match std::mem::replace(&mut self.stage, Stage::Done) {
            Stage::Done => return Ok(None),
            Stage::Start => {
                let states = self.policy.start_state(1)?;
                self.env.reset_start()?;
                let observations = self.env.reset_wait()?;
                tracing::debug!("episode started");
                (observations, states)
            }
            Stage::Running {
                observations,
                states,
            } => (observations, states),
        };

        let output = self.policy.step(&observations, &states)?;
        self.env.step_start(&output.actions)?;
        let StepResult {
            observations,
            dones,
            infos,
            ..
        } = self.env.step_wait()?;
        self.steps += 1;
        let step = self.steps;

        let Some(info) = infos.into_iter().next() else {
            return Err(EpisodeError::EmptyBatch { step }.into());
        };
        let frame = info.raw_frame.ok_or(EpisodeError::MissingFrame { step })?;
        let done = dones.iter().any(|done| *done);
        tracing::trace!(step, done, "episode step");

        if done {
            tracing::debug!(steps = step, "episode finished");
        } else {
            self.stage = Stage::Running {
                observations,
                states: output.states,
            };
        }
        Ok(Some(frame))
    }
}

impl<E: BatchEnv, P: PolicyRunner> Iterator for EpisodeFrames<'_, E, P> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance().transpose()
    }
}

impl<E: BatchEnv, P: PolicyRunner> FusedIterator for EpisodeFrames<'_, E, P> {}

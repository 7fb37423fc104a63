use crate::frame::Frame;
use anyhow::Result;
use bincode::{Decode, Encode};

/// Discrete action index.
pub type Action = usize;

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum Space {
    Discrete(usize),
    Image {
        height: usize,
        width: usize,
        channels: usize,
    },
}

impl Space {
    pub fn image_of(frame: &Frame) -> Self {
        let [height, width, channels] = frame.shape();
        Self::Image {
            height,
            width,
            channels,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Self::Discrete(size) => *size,
            Self::Image {
                height,
                width,
                channels,
            } => height * width * channels,
        }
    }

    pub fn contains_frame(&self, frame: &Frame) -> bool {
        matches!(self, Self::Image { .. }) && *self == Self::image_of(frame)
    }

    pub fn contains_action(&self, action: Action) -> bool {
        matches!(self, Self::Discrete(n) if action < *n)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct EnvironmentDescription {
    pub observation_space: Space,
    pub action_space: Space,
}

impl EnvironmentDescription {
    pub fn new(observation_space: Space, action_space: Space) -> Self {
        Self {
            observation_space,
            action_space,
        }
    }

    pub fn action_size(&self) -> usize {
        self.action_space.size()
    }

    pub fn observation_size(&self) -> usize {
        self.observation_space.size()
    }
}

/// Result of stepping a single environment once.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct Transition {
    pub observation: Frame,
    pub reward: f32,
    pub done: bool,
    /// The episode was cut by a time limit rather than ended by the game.
    pub truncated: bool,
}

/// Auxiliary per-environment data returned next to each observation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfoRecord {
    /// Untransformed observation for rendering, filled in by
    /// [`ObsInInfo`](crate::wrappers::ObsInInfo).
    pub raw_frame: Option<Frame>,
    pub truncated: bool,
}

/// One batched step, every vector indexed by environment position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepResult {
    pub observations: Vec<Frame>,
    pub rewards: Vec<f32>,
    pub dones: Vec<bool>,
    pub infos: Vec<InfoRecord>,
}

impl StepResult {
    pub fn from_transitions(transitions: Vec<Transition>) -> Self {
        let mut result = StepResult {
            observations: Vec::with_capacity(transitions.len()),
            rewards: Vec::with_capacity(transitions.len()),
            dones: Vec::with_capacity(transitions.len()),
            infos: Vec::with_capacity(transitions.len()),
        };
        for transition in transitions {
            result.observations.push(transition.observation);
            result.rewards.push(transition.reward);
            result.dones.push(transition.done);
            result.infos.push(InfoRecord {
                raw_frame: None,
                truncated: transition.truncated,
            });
        }
        result
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// A single synchronous environment.
pub trait Env {
    fn reset(&mut self) -> Result<Frame>;
    fn step(&mut self, action: Action) -> Result<Transition>;
    fn env_description(&self) -> EnvironmentDescription;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A batch of environments behind a split-phase interface.
///
/// Every `*_start` must be followed by the matching `*_wait` before another
/// call is started. Between the two calls the environments may compute
/// concurrently with the caller.
pub trait BatchEnv {
    fn num_envs(&self) -> usize;

    fn env_description(&self) -> EnvironmentDescription;

    fn reset_start(&mut self) -> Result<()>;

    fn reset_wait(&mut self) -> Result<Vec<Frame>>;

    fn step_start(&mut self, actions: &[Action]) -> Result<()>;

    fn step_wait(&mut self) -> Result<StepResult>;

    /// Releases every resource held by the batch.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

pub trait EnvBuilderTrait: Sync + Send + 'static {
    type Env: Env;

    fn build_env(&self) -> Result<Self::Env>;
}

impl<E: Env, F: Sync + Send + 'static> EnvBuilderTrait for F
where
    F: Fn() -> Result<E>,
{
    type Env = E;

    fn build_env(&self) -> Result<Self::Env> {
        (self)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_space_matches_frame_shape() {
        let frame = Frame::filled(4, 6, 3, 0);
        let space = Space::image_of(&frame);
        assert_eq!(space.size(), 72);
        assert!(space.contains_frame(&frame));
        assert!(!space.contains_frame(&Frame::filled(4, 6, 1, 0)));
        assert!(!Space::Discrete(72).contains_frame(&frame));
    }

    #[test]
    fn discrete_space_bounds_actions() {
        let space = Space::Discrete(4);
        assert!(space.contains_action(3));
        assert!(!space.contains_action(4));
    }

    #[test]
    fn transitions_split_into_columns() {
        let transitions = vec![
            Transition {
                observation: Frame::filled(1, 1, 3, 1),
                reward: 0.5,
                done: false,
                truncated: false,
            },
            Transition {
                observation: Frame::filled(1, 1, 3, 2),
                reward: -1.0,
                done: true,
                truncated: true,
            },
        ];
        let result = StepResult::from_transitions(transitions);
        assert_eq!(result.len(), 2);
        assert_eq!(result.rewards, vec![0.5, -1.0]);
        assert_eq!(result.dones, vec![false, true]);
        assert!(result.infos[1].truncated);
        assert!(result.infos.iter().all(|info| info.raw_frame.is_none()));
    }
}

use crate::{
    error::PolicyError,
    mlp::{Mlp, build_mlp},
};
use anyhow::{Result, anyhow};
use candle_core::{DType, Device, Tensor};
use candle_nn::{
    GRU, GRUConfig, Linear, Module, RNN, VarBuilder, VarMap, gru, linear,
    ops::softmax,
    rnn::GRUState,
};
use rand::{
    SeedableRng,
    distr::{Distribution, weighted::WeightedIndex},
    rngs::StdRng,
};
use reel_core::{Action, EnvironmentDescription, Frame, PolicyOutput, PolicyRunner, Space};
use std::{path::Path, sync::Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionSelection {
    /// Highest-scoring action.
    Greedy,
    /// Draw from the softmax over action scores.
    Sample { seed: u64 },
}

/// Shape of the policy network and the spaces it was trained on.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyConfig {
    /// height, width, channels
    pub observation_shape: [usize; 3],
    pub action_size: usize,
    pub feature_layers: Vec<usize>,
    pub hidden_size: usize,
    pub selection: ActionSelection,
}

impl PolicyConfig {
    pub fn new(observation_shape: [usize; 3], action_size: usize) -> Self {
        Self {
            observation_shape,
            action_size,
            feature_layers: vec![256],
            hidden_size: 256,
            selection: ActionSelection::Greedy,
        }
    }

    pub fn with_hidden_size(mut self, hidden_size: usize) -> Self {
        self.hidden_size = hidden_size;
        self
    }

    pub fn with_feature_layers(mut self, feature_layers: Vec<usize>) -> Self {
        self.feature_layers = feature_layers;
        self
    }

    pub fn with_selection(mut self, selection: ActionSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn observation_space(&self) -> Space {
        let [height, width, channels] = self.observation_shape;
        Space::Image {
            height,
            width,
            channels,
        }
    }

    pub fn action_space(&self) -> Space {
        Space::Discrete(self.action_size)
    }

    pub fn check(&self, description: &EnvironmentDescription) -> Result<(), PolicyError> {
        for (expected, actual) in [
            (self.observation_space(), &description.observation_space),
            (self.action_space(), &description.action_space),
        ] {
            if expected != *actual {
                return Err(PolicyError::IncompatibleSpaces {
                    expected,
                    actual: actual.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Hidden state of the recurrent core, one row per environment.
#[derive(Debug, Clone)]
pub struct RecurrentState(GRUState);

impl RecurrentState {
    pub fn hidden(&self) -> &Tensor {
        self.0.h()
    }

    pub fn batch_size(&self) -> usize {
        self.hidden().dims().first().copied().unwrap_or(0)
    }
}

/// Feature MLP, a GRU cell and a linear action head. All parameters live in
/// one [`VarMap`] so a checkpoint can be restored into them after the graph is
/// built.
pub struct RecurrentPolicy {
    config: PolicyConfig,
    varmap: VarMap,
    features: Mlp,
    core: GRU,
    head: Linear,
    device: Device,
    rng: Mutex<StdRng>,
}

impl RecurrentPolicy {
    /// Builds the graph with freshly initialized variables. Fails when the
    /// environment does not declare the spaces the policy was configured for.
    pub fn new(
        config: PolicyConfig,
        description: &EnvironmentDescription,
        device: &Device,
    ) -> Result<Self> {
        config.check(description)?;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let input_dim = config.observation_space().size();
        let features = build_mlp(input_dim, &config.feature_layers, &vb, "features")?;
        let core = gru(
            features.output_dim(),
            config.hidden_size,
            GRUConfig::default(),
            vb.pp("core"),
        )?;
        let head = linear(config.hidden_size, config.action_size, vb.pp("head"))?;
        let seed = match config.selection {
            ActionSelection::Sample { seed } => seed,
            ActionSelection::Greedy => 0,
        };
        tracing::debug!(
            input_dim,
            hidden_size = config.hidden_size,
            action_size = config.action_size,
            variables = varmap.all_vars().len(),
            "policy graph built"
        );
        Ok(Self {
            config,
            varmap,
            features,
            core,
            head,
            device: device.clone(),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        })
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Overwrites every variable with the tensor of the same name in the
    /// safetensors file at `path`.
    pub fn load_checkpoint(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.varmap
            .load(path)
            .map_err(|source| PolicyError::Checkpoint {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!(?path, "checkpoint loaded");
        Ok(())
    }

    pub fn save_checkpoint(&self, path: impl AsRef<Path>) -> Result<()> {
        self.varmap.save(path)?;
        Ok(())
    }

    fn observations_tensor(&self, observations: &[Frame]) -> Result<Tensor> {
        let input_dim = self.config.observation_space().size();
        let mut data = Vec::with_capacity(observations.len() * input_dim);
        for frame in observations {
            if frame.shape() != self.config.observation_shape {
                return Err(PolicyError::ObservationShape {
                    expected: self.config.observation_shape,
                    actual: frame.shape(),
                }
                .into());
            }
            data.extend(frame.as_bytes().iter().map(|pixel| *pixel as f32 / 255.0));
        }
        Ok(Tensor::from_vec(
            data,
            (observations.len(), input_dim),
            &self.device,
        )?)
    }

    fn select(&self, logits: &Tensor) -> Result<Vec<Action>> {
        match self.config.selection {
            ActionSelection::Greedy => Ok(logits
                .argmax(1)?
                .to_vec1::<u32>()?
                .into_iter()
                .map(|action| action as Action)
                .collect()),
            ActionSelection::Sample { .. } => {
                let probs: Vec<Vec<f32>> = softmax(logits, 1)?.to_vec2()?;
                let mut rng = self
                    .rng
                    .lock()
                    .map_err(|_| anyhow!("policy rng lock poisoned"))?;
                probs
                    .iter()
                    .map(|row| -> Result<Action> {
                        Ok(WeightedIndex::new(row)?.sample(&mut *rng))
                    })
                    .collect()
            }
        }
    }
}

impl PolicyRunner for RecurrentPolicy {
    type State = RecurrentState;

    fn start_state(&self, batch_size: usize) -> Result<Self::State> {
        Ok(RecurrentState(self.core.zero_state(batch_size)?))
    }

    fn step(
        &self,
        observations: &[Frame],
        states: &Self::State,
    ) -> Result<PolicyOutput<Self::State>> {
        if observations.len() != states.batch_size() {
            return Err(PolicyError::StateBatch {
                observations: observations.len(),
                states: states.batch_size(),
            }
            .into());
        }
        let xs = self.observations_tensor(observations)?;
        let features = self.features.forward(&xs)?;
        let next = self.core.step(&features, &states.0)?;
        let logits = self.head.forward(next.h())?;
        let actions = self.select(&logits)?;
        tracing::trace!(?actions, "policy step");
        Ok(PolicyOutput {
            actions,
            states: RecurrentState(next),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description(
        height: usize,
        width: usize,
        channels: usize,
        actions: usize,
    ) -> EnvironmentDescription {
        EnvironmentDescription::new(
            Space::Image {
                height,
                width,
                channels,
            },
            Space::Discrete(actions),
        )
    }

    fn small_config() -> PolicyConfig {
        PolicyConfig::new([4, 6, 3], 5)
            .with_feature_layers(vec![16])
            .with_hidden_size(8)
    }

    #[test]
    fn incompatible_spaces_fail_construction() {
        let err = RecurrentPolicy::new(small_config(), &description(4, 6, 3, 4), &Device::Cpu)
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<PolicyError>(),
            Some(PolicyError::IncompatibleSpaces {
                expected: Space::Discrete(5),
                actual: Space::Discrete(4)
            })
        ));

        let err = RecurrentPolicy::new(small_config(), &description(4, 6, 12, 5), &Device::Cpu)
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<PolicyError>(),
            Some(PolicyError::IncompatibleSpaces { .. })
        ));
    }

    #[test]
    fn step_returns_fresh_state_and_leaves_input_alone() -> Result<()> {
        let policy = RecurrentPolicy::new(small_config(), &description(4, 6, 3, 5), &Device::Cpu)?;
        let state = policy.start_state(2)?;
        assert_eq!(state.hidden().dims(), &[2, 8]);
        let before = state.hidden().to_vec2::<f32>()?;

        let observations = vec![Frame::filled(4, 6, 3, 200), Frame::filled(4, 6, 3, 10)];
        let output = policy.step(&observations, &state)?;
        assert_eq!(output.actions.len(), 2);
        assert!(output.actions.iter().all(|a| *a < 5));
        assert_eq!(output.states.hidden().dims(), &[2, 8]);
        assert_eq!(state.hidden().to_vec2::<f32>()?, before);
        assert_ne!(output.states.hidden().to_vec2::<f32>()?, before);
        Ok(())
    }

    #[test]
    fn greedy_policy_is_deterministic() -> Result<()> {
        let policy = RecurrentPolicy::new(small_config(), &description(4, 6, 3, 5), &Device::Cpu)?;
        let state = policy.start_state(1)?;
        let observations = vec![Frame::filled(4, 6, 3, 77)];
        let first = policy.step(&observations, &state)?;
        let second = policy.step(&observations, &state)?;
        assert_eq!(first.actions, second.actions);
        assert_eq!(
            first.states.hidden().to_vec2::<f32>()?,
            second.states.hidden().to_vec2::<f32>()?
        );
        Ok(())
    }

    #[test]
    fn sampled_actions_stay_in_range() -> Result<()> {
        let config = small_config().with_selection(ActionSelection::Sample { seed: 3 });
        let policy = RecurrentPolicy::new(config, &description(4, 6, 3, 5), &Device::Cpu)?;
        let mut state = policy.start_state(3)?;
        let observations = vec![Frame::filled(4, 6, 3, 1); 3];
        for _ in 0..10 {
            let output = policy.step(&observations, &state)?;
            assert!(output.actions.iter().all(|a| *a < 5));
            state = output.states;
        }
        Ok(())
    }

    #[test]
    fn wrong_observation_shape_is_rejected() -> Result<()> {
        let policy = RecurrentPolicy::new(small_config(), &description(4, 6, 3, 5), &Device::Cpu)?;
        let state = policy.start_state(1)?;
        let err = policy
            .step(&[Frame::filled(6, 4, 3, 0)], &state)
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<PolicyError>(),
            Some(PolicyError::ObservationShape { .. })
        ));
        Ok(())
    }

    #[test]
    fn batch_must_match_state() -> Result<()> {
        let policy = RecurrentPolicy::new(small_config(), &description(4, 6, 3, 5), &Device::Cpu)?;
        let state = policy.start_state(2)?;
        assert!(policy.step(&[Frame::filled(4, 6, 3, 0)], &state).is_err());
        Ok(())
    }
}

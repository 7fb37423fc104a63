//! Deterministic fakes shared by the workspace's tests.

use crate::{
    env::{Action, BatchEnv, Env, EnvironmentDescription, Space, StepResult, Transition},
    error::ProtocolError,
    frame::Frame,
    phase::{Op, PhaseTracker},
    policy::{PolicyOutput, PolicyRunner},
};
use anyhow::{Result, bail};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

/// Shared view on what a scripted environment went through.
#[derive(Debug, Clone, Default)]
pub struct EnvProbe {
    closes: Arc<AtomicUsize>,
    resets: Arc<AtomicUsize>,
    steps: Arc<AtomicUsize>,
    actions: Arc<Mutex<Vec<Action>>>,
}

impl EnvProbe {
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn steps(&self) -> usize {
        self.steps.load(Ordering::SeqCst)
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }
}

/// Single environment whose episode ends after `episode_len` steps. Every
/// observation is filled with the index of the step that produced it, reset
/// being step 0.
#[derive(Debug)]
pub struct CountingEnv {
    episode_len: usize,
    height: usize,
    width: usize,
    num_actions: usize,
    fail_at_step: Option<usize>,
    t: usize,
    probe: EnvProbe,
}

impl CountingEnv {
    pub fn new(episode_len: usize, height: usize, width: usize) -> (Self, EnvProbe) {
        let probe = EnvProbe::default();
        let env = Self {
            episode_len,
            height,
            width,
            num_actions: 4,
            fail_at_step: None,
            t: 0,
            probe: probe.clone(),
        };
        (env, probe)
    }

    pub fn failing_at(mut self, step: usize) -> Self {
        self.fail_at_step = Some(step);
        self
    }

    fn frame(&self) -> Frame {
        Frame::filled(self.height, self.width, 3, (self.t % 256) as u8)
    }
}

impl Env for CountingEnv {
    fn reset(&mut self) -> Result<Frame> {
        self.t = 0;
        self.probe.resets.fetch_add(1, Ordering::SeqCst);
        Ok(self.frame())
    }

    fn step(&mut self, action: Action) -> Result<Transition> {
        self.t += 1;
        self.probe.steps.fetch_add(1, Ordering::SeqCst);
        self.probe.actions.lock().unwrap().push(action);
        if self.fail_at_step == Some(self.t) {
            bail!("scripted failure at step {}", self.t);
        }
        Ok(Transition {
            observation: self.frame(),
            reward: self.t as f32,
            done: self.t >= self.episode_len,
            truncated: false,
        })
    }

    fn env_description(&self) -> EnvironmentDescription {
        EnvironmentDescription::new(
            Space::Image {
                height: self.height,
                width: self.width,
                channels: 3,
            },
            Space::Discrete(self.num_actions),
        )
    }

    fn close(&mut self) -> Result<()> {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// [`CountingEnv`] behind the split-phase interface, stepped on the caller's
/// thread.
#[derive(Debug)]
pub struct ScriptedEnv {
    env: CountingEnv,
    phase: PhaseTracker,
    pending_action: Option<Action>,
}

impl ScriptedEnv {
    pub fn new(episode_len: usize, height: usize, width: usize) -> (Self, EnvProbe) {
        let (env, probe) = CountingEnv::new(episode_len, height, width);
        let scripted = Self {
            env,
            phase: PhaseTracker::new(),
            pending_action: None,
        };
        (scripted, probe)
    }

    pub fn failing_at(mut self, step: usize) -> Self {
        self.env = self.env.failing_at(step);
        self
    }
}

impl BatchEnv for ScriptedEnv {
    fn num_envs(&self) -> usize {
        1
    }

    fn env_description(&self) -> EnvironmentDescription {
        self.env.env_description()
    }

    fn reset_start(&mut self) -> Result<()> {
        self.phase.begin(Op::Reset)?;
        Ok(())
    }

    fn reset_wait(&mut self) -> Result<Vec<Frame>> {
        self.phase.finish(Op::Reset)?;
        Ok(vec![self.env.reset()?])
    }

    fn step_start(&mut self, actions: &[Action]) -> Result<()> {
        if actions.len() != 1 {
            return Err(ProtocolError::BatchSize {
                expected: 1,
                actual: actions.len(),
            }
            .into());
        }
        self.phase.begin(Op::Step)?;
        self.pending_action = Some(actions[0]);
        Ok(())
    }

    fn step_wait(&mut self) -> Result<StepResult> {
        self.phase.finish(Op::Step)?;
        let action = self.pending_action.take().unwrap_or_default();
        let transition = self.env.step(action)?;
        Ok(StepResult::from_transitions(vec![transition]))
    }

    fn close(mut self) -> Result<()> {
        self.env.close()
    }
}

/// Policy whose state is a per-environment step counter and whose action is
/// that counter modulo the action count.
#[derive(Debug, Default)]
pub struct ScriptedPolicy {
    num_actions: usize,
    fail_at_call: Option<usize>,
    seen_states: Mutex<Vec<Vec<u64>>>,
}

impl ScriptedPolicy {
    pub fn new(num_actions: usize) -> Self {
        Self {
            num_actions,
            ..Default::default()
        }
    }

    /// Fails the `call`-th invocation of `step`, counting from zero.
    pub fn failing_at_call(mut self, call: usize) -> Self {
        self.fail_at_call = Some(call);
        self
    }

    pub fn seen_states(&self) -> Vec<Vec<u64>> {
        self.seen_states.lock().unwrap().clone()
    }
}

impl PolicyRunner for ScriptedPolicy {
    type State = Vec<u64>;

    fn start_state(&self, batch_size: usize) -> Result<Self::State> {
        Ok(vec![0; batch_size])
    }

    fn step(
        &self,
        observations: &[Frame],
        states: &Self::State,
    ) -> Result<PolicyOutput<Self::State>> {
        let mut seen = self.seen_states.lock().unwrap();
        if self.fail_at_call == Some(seen.len()) {
            bail!("scripted policy failure at call {}", seen.len());
        }
        seen.push(states.clone());
        assert_eq!(observations.len(), states.len());
        Ok(PolicyOutput {
            actions: states
                .iter()
                .map(|s| *s as usize % self.num_actions.max(1))
                .collect(),
            states: states.iter().map(|s| s + 1).collect(),
        })
    }
}

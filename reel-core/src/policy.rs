use crate::{env::Action, frame::Frame};
use anyhow::Result;

#[derive(Debug, Clone)]
pub struct PolicyOutput<S> {
    pub actions: Vec<Action>,
    pub states: S,
}

/// A trained policy with recurrent state.
///
/// `step` borrows the state immutably and hands back a fresh one, so the only
/// writer of the next state is the runner itself.
pub trait PolicyRunner {
    type State;

    fn start_state(&self, batch_size: usize) -> Result<Self::State>;

    fn step(&self, observations: &[Frame], states: &Self::State)
    -> Result<PolicyOutput<Self::State>>;
}

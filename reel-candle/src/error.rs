use reel_core::Space;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy expects {expected:?}, environment declares {actual:?}")]
    IncompatibleSpaces { expected: Space, actual: Space },
    #[error("observation of shape {actual:?} does not match the policy input {expected:?}")]
    ObservationShape {
        expected: [usize; 3],
        actual: [usize; 3],
    },
    #[error("batch of {observations} observations with a recurrent state for {states}")]
    StateBatch { observations: usize, states: usize },
    #[error("failed to load checkpoint {path:?}")]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: candle_core::Error,
    },
}

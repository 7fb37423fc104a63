use crate::phase::Op;
use thiserror::Error;

/// Misuse of the split-phase stepping protocol. Raised before the handle
/// touches any environment state.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("{0}_wait called without a matching {0}_start")]
    WaitWithoutStart(Op),
    #[error("{requested}_wait called while a {pending} is in flight")]
    WaitMismatch { pending: Op, requested: Op },
    #[error("{requested}_start called while a {pending} is already in flight")]
    AlreadyPending { pending: Op, requested: Op },
    #[error("expected {expected} actions, got {actual}")]
    BatchSize { expected: usize, actual: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame needs {expected} pixel values, got {actual}")]
    PixelCount { expected: usize, actual: usize },
    #[error("frame is {actual:?} (height, width), expected {expected:?}")]
    SizeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("no frames to concatenate")]
    Empty,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EpisodeError {
    #[error("step {step} carried no raw frame, is the environment wrapped in ObsInInfo?")]
    MissingFrame { step: usize },
    #[error("step {step} returned an empty batch")]
    EmptyBatch { step: usize },
}

use crate::error::ProtocolError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Reset,
    Step,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reset => f.write_str("reset"),
            Self::Step => f.write_str("step"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Pending(Op),
}

/// Tracks the IDLE -> PENDING -> IDLE cycle of a split-phase handle. Every
/// `*_start` calls [`PhaseTracker::begin`] and every `*_wait` calls
/// [`PhaseTracker::finish`] before doing any work, so misuse is rejected
/// without side effects.
#[derive(Debug, Default)]
pub struct PhaseTracker {
    phase: Phase,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn pending(&self) -> Option<Op> {
        match self.phase {
            Phase::Idle => None,
            Phase::Pending(op) => Some(op),
        }
    }

    pub fn begin(&mut self, requested: Op) -> Result<(), ProtocolError> {
        match self.phase {
            Phase::Idle => {
                self.phase = Phase::Pending(requested);
                Ok(())
            }
            Phase::Pending(pending) => Err(ProtocolError::AlreadyPending { pending, requested }),
        }
    }

    pub fn finish(&mut self, requested: Op) -> Result<(), ProtocolError> {
        match self.phase {
            Phase::Idle => Err(ProtocolError::WaitWithoutStart(requested)),
            Phase::Pending(pending) if pending == requested => {
                self.phase = Phase::Idle;
                Ok(())
            }
            Phase::Pending(pending) => Err(ProtocolError::WaitMismatch { pending, requested }),
        }
    }
}

use crate::env::BatchEnv;
use anyhow::Result;
use std::ops::{Deref, DerefMut};

/// Owns a [`BatchEnv`] for the length of a run and closes it exactly once:
/// through [`EnvGuard::close`] on success, or on drop when the run bails out
/// early.
pub struct EnvGuard<E: BatchEnv> {
    env: Option<E>,
}

impl<E: BatchEnv> EnvGuard<E> {
    pub fn new(env: E) -> Self {
        Self { env: Some(env) }
    }

    /// Closes the environment and reports the outcome.
    pub fn close(mut self) -> Result<()> {
        match self.env.take() {
            Some(env) => env.close(),
            None => Ok(()),
        }
    }
}

impl<E: BatchEnv> Deref for EnvGuard<E> {
    type Target = E;

    fn deref(&self) -> &E {
        match &self.env {
            Some(env) => env,
            None => unreachable!("only close takes the environment and it consumes the guard"),
        }
    }
}

impl<E: BatchEnv> DerefMut for EnvGuard<E> {
    fn deref_mut(&mut self) -> &mut E {
        match &mut self.env {
            Some(env) => env,
            None => unreachable!("only close takes the environment and it consumes the guard"),
        }
    }
}

impl<E: BatchEnv> Drop for EnvGuard<E> {
    fn drop(&mut self) {
        if let Some(env) = self.env.take() {
            tracing::debug!("closing environment on early exit");
            if let Err(err) = env.close() {
                tracing::warn!("failed to close environment: {err:#}");
            }
        }
    }
}

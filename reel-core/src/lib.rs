pub mod env;
pub mod episode;
pub mod error;
pub mod frame;
pub mod guard;
pub mod ipc;
pub mod phase;
pub mod policy;
pub mod subproc;
pub mod thread_env;
pub mod wrappers;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use env::{Action, BatchEnv, Env, EnvironmentDescription, Space, StepResult, Transition};
pub use episode::EpisodeFrames;
pub use frame::Frame;
pub use guard::EnvGuard;
pub use policy::{PolicyOutput, PolicyRunner};

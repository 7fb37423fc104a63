pub mod action;
pub mod game;
pub mod sim_env;
pub mod spec;

pub use action::{ActionConverter, InputEvent, KeyActions, TapActions};
pub use game::{BuiltinGame, RawEnv};
pub use sim_env::{SimConfig, SimEnv, make_env};
pub use spec::{EnvSpec, InputKind, spec_for_name};

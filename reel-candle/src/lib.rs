pub mod error;
pub mod mlp;
pub mod policy;

pub use error::PolicyError;
pub use policy::{ActionSelection, PolicyConfig, RecurrentPolicy, RecurrentState};

use crate::{encoder::Encoder, export::export_video, settings::VideoSettings};
use anyhow::Result;
use reel_core::{BatchEnv, EnvGuard, EnvironmentDescription, EpisodeFrames, PolicyRunner};

/// Runs one episode of `env` under the policy returned by `build_policy` and
/// writes it to a video. The environment is closed exactly once, whether the
/// run succeeds or fails at any stage.
///
/// `env` must put raw frames into its info records, i.e. be wrapped in
/// [`reel_core::wrappers::ObsInInfo`].
pub fn record_episode<E, P, F, Enc>(
    env: E,
    build_policy: F,
    encoder: &Enc,
    settings: &VideoSettings,
) -> Result<usize>
where
    E: BatchEnv,
    P: PolicyRunner,
    F: FnOnce(&EnvironmentDescription) -> Result<P>,
    Enc: Encoder,
{
    let mut env = EnvGuard::new(env);
    let policy = build_policy(&env.env_description())?;
    tracing::info!("Gathering episode...");
    let written = export_video(encoder, settings, EpisodeFrames::new(&mut *env, &policy))?;
    env.close()?;
    Ok(written)
}

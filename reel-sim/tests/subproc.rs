use anyhow::Result;
use reel_core::{
    BatchEnv, EnvGuard, EpisodeFrames,
    error::ProtocolError,
    subproc::{SubprocEnv, SubprocEnvConfig},
    test_utils::ScriptedPolicy,
    wrappers::ObsInInfo,
};

fn simulator(env: &str, max_timesteps: usize) -> SubprocEnvConfig {
    SubprocEnvConfig::new(env!("CARGO_BIN_EXE_reel-sim"))
        .arg("--env")
        .arg(env)
        .arg("--max-timesteps")
        .arg(max_timesteps.to_string())
}

#[test]
fn simulator_process_serves_an_episode() -> Result<()> {
    let env = SubprocEnv::spawn(&simulator("Knightower-v0", 6))?;
    assert_eq!(env.env_description().action_size(), 8);
    let mut env = ObsInInfo::new(env);
    let policy = ScriptedPolicy::new(8);

    let frames = EpisodeFrames::new(&mut env, &policy).collect::<Result<Vec<_>>>()?;
    assert_eq!(frames.len(), 6);
    assert!(frames.iter().all(|frame| frame.shape() == [288, 192, 3]));
    env.close()
}

#[test]
fn protocol_misuse_is_reported_locally() -> Result<()> {
    let mut env = EnvGuard::new(SubprocEnv::spawn(&simulator("PopUp-v0", 10))?);
    let err = env.step_wait().unwrap_err();
    assert_eq!(
        err.downcast_ref::<ProtocolError>(),
        Some(&ProtocolError::WaitWithoutStart(reel_core::phase::Op::Step))
    );
    env.reset_start()?;
    assert_eq!(env.reset_wait()?.len(), 1);
    env.close()
}

#[test]
fn remote_errors_surface_from_wait() -> Result<()> {
    let mut env = EnvGuard::new(SubprocEnv::spawn(&simulator("PopUp-v0", 10))?);
    env.reset_start()?;
    env.reset_wait()?;
    env.step_start(&[5])?;
    let err = env.step_wait().unwrap_err();
    assert!(format!("{err:#}").contains("outside the action space"));
    env.close()
}

#[test]
fn unknown_env_fails_to_spawn() {
    let err = SubprocEnv::spawn(&simulator("Missing-v0", 10)).err().unwrap();
    assert!(err.to_string().contains("exited"));
}

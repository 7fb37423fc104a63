use anyhow::{Result, anyhow};
use candle_core::Device;
use reel_candle::{PolicyConfig, RecurrentPolicy};
use reel_core::{
    BatchEnv,
    subproc::{SubprocEnv, SubprocEnvConfig},
    thread_env::ThreadEnv,
    wrappers::{Downsample, FrameStack, ObsInInfo},
};
use reel_sim::{EnvSpec, SimConfig, make_env, spec_for_name};
use reel_video::{Encoder, VideoSettings, record_episode};
use std::path::{Path, PathBuf};

pub const DOWNSAMPLE: usize = 4;
pub const FRAME_STACK: usize = 4;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub env: String,
    pub video_path: PathBuf,
    pub checkpoint: PathBuf,
    pub sim: SimConfig,
    pub hidden_size: usize,
    pub simulator: Option<PathBuf>,
}

/// The policy sees downsampled frames, `FRAME_STACK` at a time.
pub fn policy_config(spec: &EnvSpec, hidden_size: usize) -> PolicyConfig {
    let observation_shape = [
        spec.height.div_ceil(DOWNSAMPLE),
        spec.width.div_ceil(DOWNSAMPLE),
        3 * FRAME_STACK,
    ];
    let action_size = spec.action_converter().action_space().size();
    PolicyConfig::new(observation_shape, action_size).with_hidden_size(hidden_size)
}

fn simulator_config(program: &Path, config: &RunConfig) -> SubprocEnvConfig {
    SubprocEnvConfig::new(program)
        .arg("--env")
        .arg(&config.env)
        .arg("--fps")
        .arg(config.sim.fps.to_string())
        .arg("--max-timesteps")
        .arg(config.sim.max_timesteps.to_string())
        .arg("--seed")
        .arg(config.sim.seed.to_string())
}

/// Records one episode of `config.env` and returns the number of frames in
/// the video.
pub fn run<Enc: Encoder>(config: &RunConfig, encoder: &Enc) -> Result<usize> {
    let spec = spec_for_name(&config.env)
        .ok_or_else(|| anyhow!("unknown environment: {}", config.env))?;
    let settings = VideoSettings::new(&config.video_path, spec.width, spec.height);

    tracing::info!("Creating environments...");
    match &config.simulator {
        Some(program) => {
            let env = SubprocEnv::spawn(&simulator_config(program, config))?;
            record(env, &spec, config, encoder, &settings)
        }
        None => {
            let name = config.env.clone();
            let sim = config.sim.clone();
            let env = ThreadEnv::single(move || make_env(&name, &sim))?;
            record(env, &spec, config, encoder, &settings)
        }
    }
}

fn record<E: BatchEnv, Enc: Encoder>(
    env: E,
    spec: &EnvSpec,
    config: &RunConfig,
    encoder: &Enc,
    settings: &VideoSettings,
) -> Result<usize> {
    let env = FrameStack::new(Downsample::new(ObsInInfo::new(env), DOWNSAMPLE), FRAME_STACK);
    record_episode(
        env,
        |description| {
            tracing::info!("Creating model graph...");
            let mut policy = RecurrentPolicy::new(
                policy_config(spec, config.hidden_size),
                description,
                &Device::Cpu,
            )?;
            tracing::info!(path = ?config.checkpoint, "Loading checkpoint...");
            policy.load_checkpoint(&config.checkpoint)?;
            Ok(policy)
        },
        encoder,
        settings,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_core::{EnvironmentDescription, Space};
    use reel_video::test_utils::RecordingEncoder;

    const ENV: &str = "Ladders-v0";
    const HIDDEN: usize = 16;

    fn config(checkpoint: PathBuf, max_timesteps: usize) -> RunConfig {
        RunConfig {
            env: ENV.into(),
            video_path: "unused.mp4".into(),
            checkpoint,
            sim: SimConfig {
                max_timesteps,
                ..SimConfig::default()
            },
            hidden_size: HIDDEN,
            simulator: None,
        }
    }

    fn write_checkpoint(name: &str) -> Result<PathBuf> {
        let spec = spec_for_name(ENV).unwrap();
        let policy_config = policy_config(&spec, HIDDEN);
        let description = EnvironmentDescription::new(
            policy_config.observation_space(),
            policy_config.action_space(),
        );
        let path =
            std::env::temp_dir().join(format!("reel-cli-{}-{name}.pkl", std::process::id()));
        RecurrentPolicy::new(policy_config, &description, &Device::Cpu)?.save_checkpoint(&path)?;
        Ok(path)
    }

    #[test]
    fn policy_sees_stacked_downsampled_frames() {
        let spec = spec_for_name(ENV).unwrap();
        let config = policy_config(&spec, 32);
        assert_eq!(
            config.observation_space(),
            Space::Image {
                height: 31,
                width: 40,
                channels: 12
            }
        );
        assert_eq!(config.action_space(), Space::Discrete(16));
        assert_eq!(config.hidden_size, 32);
    }

    #[test]
    fn records_full_resolution_frames_until_the_time_limit() -> Result<()> {
        let checkpoint = write_checkpoint("episode")?;
        let encoder = RecordingEncoder::default();
        let written = run(&config(checkpoint.clone(), 5), &encoder);
        std::fs::remove_file(&checkpoint)?;

        assert_eq!(written?, 5);
        let recording = encoder.recording();
        assert_eq!(recording.frames.len(), 5);
        assert!(recording.frames.iter().all(|f| f.shape() == [122, 160, 3]));
        let settings = recording.settings.unwrap();
        assert_eq!((settings.width, settings.height, settings.fps), (160, 122, 10));
        Ok(())
    }

    #[test]
    fn simulator_fps_does_not_change_the_video_rate() -> Result<()> {
        let checkpoint = write_checkpoint("fps")?;
        let encoder = RecordingEncoder::default();
        let mut config = config(checkpoint.clone(), 3);
        config.sim.fps = 30;
        let written = run(&config, &encoder);
        std::fs::remove_file(&checkpoint)?;

        assert_eq!(written?, 3);
        assert_eq!(encoder.recording().settings.unwrap().fps, 10);
        Ok(())
    }

    #[test]
    fn missing_checkpoint_fails_the_run() {
        let encoder = RecordingEncoder::default();
        let config = config(std::env::temp_dir().join("reel-cli-no-such-checkpoint.pkl"), 5);
        assert!(run(&config, &encoder).is_err());
        assert!(encoder.recording().frames.is_empty());
    }

    #[test]
    fn unknown_env_fails_before_anything_starts() {
        let mut config = config("unused.pkl".into(), 5);
        config.env = "Nope-v0".into();
        let err = run(&config, &RecordingEncoder::default()).unwrap_err();
        assert!(err.to_string().contains("Nope-v0"));
    }
}

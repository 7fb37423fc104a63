use anyhow::{Result, bail};
use reel_core::{
    test_utils::{ScriptedEnv, ScriptedPolicy},
    wrappers::ObsInInfo,
};
use reel_video::{
    FfmpegEncoder, VideoError, VideoSettings, record_episode, test_utils::RecordingEncoder,
};

#[test]
fn five_step_episode_becomes_five_frames() -> Result<()> {
    let (env, probe) = ScriptedEnv::new(5, 256, 256);
    let encoder = RecordingEncoder::default();
    let settings = VideoSettings::new("episode.mp4", 256, 256);

    let written = record_episode(
        ObsInInfo::new(env),
        |description| Ok(ScriptedPolicy::new(description.action_size())),
        &encoder,
        &settings,
    )?;

    assert_eq!(written, 5);
    let recording = encoder.recording();
    assert_eq!(recording.frames.len(), 5);
    assert!(recording.frames.iter().all(|f| f.shape() == [256, 256, 3]));
    let recorded = recording.settings.unwrap();
    assert_eq!((recorded.width, recorded.height, recorded.fps), (256, 256, 10));
    assert_eq!(probe.steps(), 5);
    assert_eq!(probe.closes(), 1);
    Ok(())
}

#[test]
fn encoder_start_failure_still_closes_the_env() {
    let (env, probe) = ScriptedEnv::new(5, 8, 8);
    let settings = VideoSettings::new("/no/such/dir/episode.mp4", 8, 8);
    let err = record_episode(
        ObsInInfo::new(env),
        |description| Ok(ScriptedPolicy::new(description.action_size())),
        &FfmpegEncoder::default(),
        &settings,
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<VideoError>(),
        Some(VideoError::MissingOutputDir(_))
    ));
    assert_eq!(probe.steps(), 0);
    assert_eq!(probe.closes(), 1);
}

#[test]
fn policy_build_failure_still_closes_the_env() {
    let (env, probe) = ScriptedEnv::new(5, 8, 8);
    let result = record_episode(
        ObsInInfo::new(env),
        |_| -> Result<ScriptedPolicy> { bail!("checkpoint missing") },
        &RecordingEncoder::default(),
        &VideoSettings::new("episode.mp4", 8, 8),
    );
    assert!(result.is_err());
    assert_eq!(probe.closes(), 1);
}

#[test]
fn step_failure_mid_episode_closes_once() {
    let (env, probe) = ScriptedEnv::new(10, 8, 8);
    let encoder = RecordingEncoder::default();
    let result = record_episode(
        ObsInInfo::new(env.failing_at(3)),
        |description| Ok(ScriptedPolicy::new(description.action_size())),
        &encoder,
        &VideoSettings::new("episode.mp4", 8, 8),
    );
    assert!(result.is_err());
    assert_eq!(encoder.recording().frames.len(), 2);
    assert!(!encoder.recording().finished);
    assert_eq!(probe.closes(), 1);
}

#[test]
fn write_failure_mid_video_closes_once() {
    let (env, probe) = ScriptedEnv::new(10, 8, 8);
    let encoder = RecordingEncoder::failing_at_frame(2);
    let err = record_episode(
        ObsInInfo::new(env),
        |description| Ok(ScriptedPolicy::new(description.action_size())),
        &encoder,
        &VideoSettings::new("episode.mp4", 8, 8),
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<VideoError>(),
        Some(VideoError::Write { index: 2, .. })
    ));
    assert_eq!(encoder.recording().frames.len(), 2);
    assert_eq!(probe.steps(), 3);
    assert_eq!(probe.closes(), 1);
}

#[test]
fn unaugmented_env_is_rejected() {
    let (env, probe) = ScriptedEnv::new(5, 8, 8);
    let result = record_episode(
        env,
        |description| Ok(ScriptedPolicy::new(description.action_size())),
        &RecordingEncoder::default(),
        &VideoSettings::new("episode.mp4", 8, 8),
    );
    assert!(result.is_err());
    assert_eq!(probe.closes(), 1);
}

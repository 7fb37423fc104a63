use anyhow::Result;
use candle_core::Device;
use reel_candle::{PolicyConfig, PolicyError, RecurrentPolicy};
use reel_core::{EnvironmentDescription, Frame, PolicyRunner, Space};
use std::path::PathBuf;

fn description() -> EnvironmentDescription {
    EnvironmentDescription::new(
        Space::Image {
            height: 3,
            width: 5,
            channels: 6,
        },
        Space::Discrete(4),
    )
}

fn config() -> PolicyConfig {
    PolicyConfig::new([3, 5, 6], 4)
        .with_feature_layers(vec![12])
        .with_hidden_size(10)
}

fn checkpoint_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("reel-candle-{}-{name}.safetensors", std::process::id()))
}

fn rollout(policy: &RecurrentPolicy) -> Result<(Vec<usize>, Vec<Vec<f32>>)> {
    let mut state = policy.start_state(1)?;
    let mut actions = Vec::new();
    for value in [0u8, 90, 180, 255] {
        let output = policy.step(&[Frame::filled(3, 5, 6, value)], &state)?;
        actions.extend(output.actions);
        state = output.states;
    }
    Ok((actions, state.hidden().to_vec2()?))
}

#[test]
fn loaded_checkpoint_reproduces_the_saved_policy() -> Result<()> {
    let path = checkpoint_path("roundtrip");
    let trained = RecurrentPolicy::new(config(), &description(), &Device::Cpu)?;
    trained.save_checkpoint(&path)?;

    let mut restored = RecurrentPolicy::new(config(), &description(), &Device::Cpu)?;
    restored.load_checkpoint(&path)?;
    std::fs::remove_file(&path)?;

    assert_eq!(rollout(&trained)?, rollout(&restored)?);
    Ok(())
}

#[test]
fn missing_checkpoint_is_a_policy_error() -> Result<()> {
    let mut policy = RecurrentPolicy::new(config(), &description(), &Device::Cpu)?;
    let err = policy
        .load_checkpoint(checkpoint_path("missing"))
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PolicyError>(),
        Some(PolicyError::Checkpoint { .. })
    ));
    Ok(())
}

#[test]
fn checkpoint_for_another_architecture_is_rejected() -> Result<()> {
    let path = checkpoint_path("wider");
    RecurrentPolicy::new(config().with_hidden_size(16), &description(), &Device::Cpu)?
        .save_checkpoint(&path)?;

    let mut policy = RecurrentPolicy::new(config(), &description(), &Device::Cpu)?;
    let loaded = policy.load_checkpoint(&path);
    std::fs::remove_file(&path)?;
    assert!(loaded.is_err());
    Ok(())
}

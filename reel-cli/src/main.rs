mod run;

use anyhow::Result;
use clap::Parser;
use reel_sim::SimConfig;
use reel_video::{DEFAULT_FPS, FfmpegEncoder};
use run::{RunConfig, run};
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(about = "Record one episode of a trained agent to a video file")]
struct Args {
    /// Output video file.
    #[arg(long, default_value = "video.mp4")]
    path: PathBuf,

    #[arg(long, default_value = "Knightower-v0")]
    env: String,

    /// Policy checkpoint in safetensors format.
    #[arg(long, default_value = "ppo_agent.pkl")]
    save_path: PathBuf,

    /// Simulated frames per second. The video is always written at 10 fps.
    #[arg(long, default_value_t = DEFAULT_FPS)]
    fps: u32,

    /// Step limit for the episode; 0 runs until the game ends.
    #[arg(long, default_value_t = 3000)]
    max_timesteps: usize,

    /// Recurrent state size the checkpoint was trained with.
    #[arg(long, default_value_t = 256)]
    hidden_size: usize,

    /// Run the environment in this simulator executable instead of in-process.
    #[arg(long)]
    simulator: Option<PathBuf>,

    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = RunConfig {
        env: args.env,
        video_path: args.path,
        checkpoint: args.save_path,
        sim: SimConfig {
            fps: args.fps,
            max_timesteps: args.max_timesteps,
            ..SimConfig::default()
        },
        hidden_size: args.hidden_size,
        simulator: args.simulator,
    };
    let frames = run(&config, &FfmpegEncoder::new(args.ffmpeg))?;
    tracing::info!(frames, path = ?config.video_path, "done");
    Ok(())
}

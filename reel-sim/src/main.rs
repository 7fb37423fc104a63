// Hosts one built-in game and serves it to a recorder over a local socket.

use anyhow::Result;
use clap::Parser;
use reel_core::subproc::serve_env;
use reel_sim::{SimConfig, make_env};

#[derive(Parser, Debug)]
#[command(about = "Serve a simulated environment over a local socket")]
struct Args {
    #[arg(long)]
    env: String,

    #[arg(long)]
    socket_name: String,

    #[arg(long, default_value_t = 10)]
    fps: u32,

    #[arg(long, default_value_t = 3000)]
    max_timesteps: usize,

    #[arg(long)]
    reward_scale: Option<f32>,

    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let args = Args::parse();
    let config = SimConfig {
        fps: args.fps,
        max_timesteps: args.max_timesteps,
        reward_scale: args.reward_scale,
        seed: args.seed,
    };
    let env = make_env(&args.env, &config)?;
    tracing::debug!(env = %args.env, socket = %args.socket_name, "serving environment");
    serve_env(env, &args.socket_name)
}

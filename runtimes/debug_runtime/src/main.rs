// Debug Runtime - HTTP-controlled navigation runtime for testing and automation
//
// Runs the navigation system against a simulated flat world at a fixed frame
// rate and exposes a localhost-only HTTP API for driving input, teleporting,
// and starting or ending simulated immersive sessions.

mod commands;
mod frame_loop;
mod server;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use engine::SystemClock;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};
use wayfinder::session::spawn_session_timer;
use wayfinder::sim::{FlatWorld, SimulatedXrHost};
use wayfinder::{NavigationSystem, SessionManager, WayfinderConfig};

use crate::commands::RuntimeCommand;
use crate::frame_loop::FrameLoop;
use crate::server::AppState;

#[derive(Parser)]
#[command(name = "debug_runtime")]
#[command(about = "HTTP-controlled navigation runtime for testing and automation")]
struct Args {
    /// Port to bind HTTP server to
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Configuration file (defaults to wayfinder.toml or .wayfinder.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Floor height of the simulated world
    #[arg(long, default_value = "0.0")]
    floor: f32,

    /// Water level override
    #[arg(long)]
    water_level: Option<f32>,

    /// Report immersive VR as supported
    #[arg(long)]
    vr: bool,

    /// Report immersive AR as supported
    #[arg(long)]
    ar: bool,

    /// Frames per second of the navigation loop
    #[arg(long, default_value = "60")]
    frame_rate: u32,

    /// Stop after this many frames
    #[arg(long)]
    frames: Option<u64>,

    /// Session timer period (e.g. "5s", "500ms")
    #[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
    timer_period: Duration,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_config = engine::logging::init_logging("WAYFINDER_LOG");
    let args = Args::parse();

    let mut config = WayfinderConfig::load(args.config.as_deref())
        .await
        .context("Failed to load configuration")?;
    if args.water_level.is_some() {
        config.swim.water_level = args.water_level;
    }

    info!(
        "Starting debug runtime on port {} (vr: {}, ar: {}, log level: {})",
        args.port, args.vr, args.ar, log_config.global_level()
    );

    let clock = Arc::new(SystemClock);
    let mut navigation = NavigationSystem::new(FlatWorld::new(args.floor), clock.clone(), &config);

    let xr_host = Arc::new(SimulatedXrHost::new(args.vr, args.ar));
    let sessions = Arc::new(Mutex::new(SessionManager::new(
        xr_host,
        clock,
        config.session.clone(),
    )));

    // Poses leave the frame loop through a channel; the session manager is
    // only ever locked from async tasks.
    let (pose_tx, mut pose_rx) = mpsc::unbounded_channel();
    navigation.on_pose_changed(move |pose| {
        let _ = pose_tx.send(*pose);
    });
    let pose_sessions = sessions.clone();
    tokio::spawn(async move {
        while let Some(pose) = pose_rx.recv().await {
            pose_sessions.lock().await.on_pose_changed(&pose);
        }
    });

    let (command_tx, command_rx) = mpsc::unbounded_channel();

    let (warning_tx, mut warning_rx) = mpsc::unbounded_channel();
    let mut timer = spawn_session_timer(sessions.clone(), args.timer_period, warning_tx);
    let warning_commands = command_tx.clone();
    tokio::spawn(async move {
        while let Some(warning) = warning_rx.recv().await {
            warn!("{}", warning);
            let _ = warning_commands.send(RuntimeCommand::SetImmersive(None));
        }
    });

    let frames = tokio::spawn(
        FrameLoop::new(navigation, command_rx, args.frame_rate, args.frames).run(),
    );

    let state = AppState {
        commands: command_tx.clone(),
        sessions: sessions.clone(),
    };

    tokio::select! {
        result = server::serve(args.port, state) => {
            if let Err(err) = result {
                warn!("HTTP server stopped with error: {:#}", err);
            }
            let _ = command_tx.send(RuntimeCommand::Shutdown);
        }
        _ = frames => {
            info!("Frame loop finished, shutting down");
        }
    }

    timer.stop();
    sessions.lock().await.dispose().await;
    info!("Debug runtime stopped");

    Ok(())
}

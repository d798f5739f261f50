//! # Aim Runner
//!
//! Main entry point of the aim assistant. Starts the grab thread, runs the
//! aim loop on a blocking worker and writes diagnostics until the source is
//! exhausted or a shutdown signal arrives.

mod config;

use crate::config::RunnerConfig;

use aim_capture::{FrameSlot, GrabThread};
use aim_core::AimMethod;
use aim_cv::{AimAssistant, OverlayRenderer};
use aim_telemetry::MetricsCollector;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::signal;
use tracing::{debug, error, info, trace};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Longest wait for a frame before the running flag is checked again
const FRAME_POLL: Duration = Duration::from_millis(200);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    info!("Starting aim runner v{}", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("AIM_CONFIG").ok())
        .map_or_else(|| PathBuf::from("config/aim.toml"), PathBuf::from);
    let config = RunnerConfig::load(&config_path)?;
    info!("Configuration loaded from {}", config_path.display());
    info!("   Arm: {}, enemy: {}", config.aim.arm, config.aim.enemy_team);
    info!("   Frame size: {}x{}", config.frame_size.width, config.frame_size.height);
    info!("   Params: {}", config.aim.params.buff.display());

    let metrics = Arc::new(MetricsCollector::new()?);
    let slot = Arc::new(FrameSlot::new());
    let camera = config.source.build(config.frame_size, config.aim.enemy_team);
    let mut grab = GrabThread::spawn(camera, Arc::clone(&slot), Some(config.frame_size))?;
    info!("Grab thread started");

    let running = Arc::new(AtomicBool::new(true));
    let shutdown = {
        let running = Arc::clone(&running);
        let slot = Arc::clone(&slot);
        tokio::spawn(async move {
            shutdown_signal().await;
            running.store(false, Ordering::Release);
            slot.close();
        })
    };

    let worker = {
        let slot = Arc::clone(&slot);
        let metrics = Arc::clone(&metrics);
        let running = Arc::clone(&running);
        tokio::task::spawn_blocking(move || aim_loop(&config, &slot, &metrics, &running))
    };
    let frames = worker.await??;

    shutdown.abort();
    grab.stop();
    info!("Processed {} frames, {} discarded", frames, slot.discarded());
    info!("Aim runner stopped");
    Ok(())
}

/// Initialize logging with tracing
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,aim_cv=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(filter)
        .init();
}

/// Resolves on Ctrl+C or, on unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down...");
        }
    }
}

/// Aim at every frame from `slot` until it closes or `running` drops
fn aim_loop(
    config: &RunnerConfig,
    slot: &FrameSlot,
    metrics: &MetricsCollector,
    running: &AtomicBool,
) -> anyhow::Result<u64> {
    let mut assistant = AimAssistant::from_config(&config.aim)?;
    assistant.set_rfid(config.rfid);
    assistant.set_time(config.game_time);
    let renderer = OverlayRenderer::new(&config.aim.rendering);

    if let Some(dir) = &config.render_dir {
        std::fs::create_dir_all(dir)?;
    }

    let mut frames: u64 = 0;
    while running.load(Ordering::Acquire) {
        let Some(mut frame) = slot.take_timeout(FRAME_POLL) else {
            if slot.is_closed() {
                break;
            }
            continue;
        };

        let start = Instant::now();
        let armors = assistant.aim(&frame)?;
        let elapsed = start.elapsed();

        let targets: Vec<_> = armors.iter().filter(|a| !a.is_empty()).collect();
        metrics.record_frame(assistant.method(), elapsed.as_secs_f64(), targets.len() as u64);
        metrics.set_frames_discarded(slot.discarded());
        if assistant.method() == AimMethod::Buff {
            metrics.set_buff_direction(assistant.buff_predictor().direction());
        }
        match targets.first() {
            Some(target) => debug!(
                "Frame {}: aim at ({:.1}, {:.1}) in {} us",
                frames,
                target.center().x,
                target.center().y,
                elapsed.as_micros()
            ),
            None => trace!("Frame {}: no target", frames),
        }

        if config.aim.verbosity > 0 {
            let overlay = assistant.visualize_result(config.aim.verbosity);
            renderer.render(&mut frame, &overlay);
            trace!("{}", renderer.format_overlay_text(&overlay));
            if let Some(dir) = &config.render_dir {
                if frames % config.render_every.max(1) == 0 {
                    frame.save(dir.join(format!("frame_{:06}.png", frames)))?;
                }
            }
        }

        frames += 1;
        if let Some(path) = &config.metrics_path {
            if frames % config.metrics_every.max(1) == 0 {
                metrics.write_to(path)?;
            }
        }
    }

    if let Some(path) = &config.metrics_path {
        metrics.write_to(path)?;
    }
    Ok(frames)
}

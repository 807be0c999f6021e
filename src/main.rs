use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

mod analytics;
mod camera;
mod config;
mod display;

use config::{Config, DEFAULT_CONFIG_PATH};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("armwatch=debug".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = if std::path::Path::new(&config_path).exists() {
        Config::load_from(&config_path)?
    } else {
        tracing::warn!(path = %config_path, "config file not found, using defaults");
        Config::default()
    };

    tracing::info!(
        device = %config.camera.device,
        width = config.camera.width,
        height = config.camera.height,
        smoothing_factor = config.analytics.smoothing_factor,
        threshold_cutoff = config.analytics.threshold_cutoff,
        min_contour_area = config.analytics.min_contour_area,
        tie_break = ?config.analytics.tie_break,
        "loaded config"
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let mut runner = analytics::spawn_runner(config, Arc::clone(&shutdown));

    let interrupted = tokio::select! {
        result = &mut runner => {
            if let Err(e) = result {
                tracing::error!("runner task failed: {}", e);
            }
            false
        }
        _ = tokio::signal::ctrl_c() => true,
    };

    if interrupted {
        tracing::info!("shutdown signal received");
        shutdown.store(true, Ordering::Relaxed);
        if let Err(e) = runner.await {
            tracing::error!("runner task failed: {}", e);
        }
    }

    tracing::info!("shutdown complete");

    Ok(())
}

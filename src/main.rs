//! T5 Bridge
//!
//! Drives up to four pairs of AR glasses against the simulated hardware
//! service: claims devices, tracks poses, decodes wand input and submits frames.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use t5_bridge::config::{watcher::ConfigWatcher, AppConfig};
use t5_bridge::input::InputEvent;
use t5_bridge::paths::AppPaths;
use t5_bridge::runtime::{Runtime, StepHook};
use t5_bridge::sdk::sim::SimulatedService;
use t5_bridge::sdk::HardwareService;

/// T5 Bridge - session, pose and wand input core for AR glasses
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults to the platform config location)
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Also write logs to a daily rolling file in the logs directory
    #[arg(long)]
    log_file: bool,

    /// List glasses visible to the simulated service and exit
    #[arg(long)]
    list_devices: bool,

    /// Run for the given number of seconds, print slot status as JSON and exit
    #[arg(long, value_name = "SECS")]
    status_after: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let paths = AppPaths::detect();

    let logs_dir = args.log_file.then_some(paths.logs_dir.as_path());
    let _log_guard = init_logging(&args.log_level, args.log_json, logs_dir)?;

    info!("Starting T5 Bridge v{}...", env!("CARGO_PKG_VERSION"));

    let config_path = match args.config.clone() {
        Some(path) => path,
        None => {
            paths.ensure_directories()?;
            paths.config.to_string_lossy().to_string()
        }
    };
    info!("Configuration file: {}", config_path);

    if args.list_devices {
        let config = AppConfig::load_or_default(&config_path).await?;
        list_devices_formatted(&simulated_service(&config));
        return Ok(());
    }

    // Load configuration with hot-reload watcher
    let (config_watcher, initial_config) = ConfigWatcher::new(config_path).await?;
    info!("Configuration loaded successfully with hot-reload enabled");

    let service = Arc::new(simulated_service(&initial_config));
    let animated = service.clone();
    let animate: StepHook = Box::new(move |t: f64| animated.animate(t));

    let runtime = Runtime::start(&initial_config, service, Some(animate)).await?;
    runtime.subscribe(Arc::new(log_input_event)).await;

    if let Some(secs) = args.status_after {
        tokio::time::sleep(Duration::from_secs_f64(secs.max(0.0))).await;
        print_status(&runtime)?;
        runtime.shutdown();
        return Ok(());
    }

    run_app(runtime, config_watcher, shutdown_signal()).await?;

    info!("T5 Bridge shutdown complete");
    Ok(())
}

async fn run_app(
    runtime: Runtime,
    mut config_watcher: ConfigWatcher,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    info!("Ready, waiting for glasses");

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(new_config) = config_watcher.next_config() => {
                info!("🔄 Applying configuration from {}", config_watcher.path().display());
                runtime.apply_config(&new_config);
            }

            _ = &mut shutdown => {
                info!("Shutting down...");
                break;
            }
        }
    }

    runtime.shutdown();
    Ok(())
}

fn simulated_service(config: &AppConfig) -> SimulatedService {
    SimulatedService::with_devices(config.application.client_info(), config.simulator.to_devices())
}

fn log_input_event(event: InputEvent) {
    match event {
        InputEvent::Connection { control_id, connected } => {
            if connected {
                info!("🎮 {} connected", control_id);
            } else {
                info!("🎮 {} disconnected", control_id);
            }
        }
        InputEvent::Button { control_id, pressed } => {
            debug!("{} {}", control_id, if pressed { "pressed" } else { "released" });
        }
        InputEvent::Analog { control_id, value } => trace!("{} = {:.3}", control_id, value),
    }
}

fn print_status(runtime: &Runtime) -> Result<()> {
    let status = serde_json::to_string_pretty(&runtime.status()).context("Failed to serialize slot status")?;
    println!("{}", status);
    Ok(())
}

fn list_devices_formatted(service: &dyn HardwareService) {
    use colored::*;

    println!("\n{}", "=== Visible Glasses ===".bold().cyan());

    match service.list_glasses() {
        Ok(ids) if ids.is_empty() => println!("  {}", "(none)".dimmed()),
        Ok(ids) => {
            for (idx, id) in ids.iter().enumerate() {
                println!("  {} {}", format!("[{}]", idx).yellow(), id.green());
            }
            println!("\n  Total: {}", ids.len().to_string().green());
        }
        Err(e) => println!("  {} {}", "Service error:".red(), e),
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` overrides `level`. When `logs_dir` is given a non-blocking daily
/// file sink is added; the returned guard must live until exit.
fn init_logging(level: &str, json: bool, logs_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let (file_layer, guard) = match logs_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create logs directory {}", dir.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "t5-bridge.log"));
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let text_layer = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
    });
    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json().with_target(false));

    tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C ({}), shutting down", e);
        return;
    }
    info!("Shutdown signal received");
}

//! Virtual Touchpad
//!
//! Replays recorded pointer/touch scripts through the analog touchpad engine
//! and prints the analog vectors and clicks it produces.

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use virtual_touchpad::config::watcher::ConfigWatcher;
use virtual_touchpad::engine::{Analog, ClickEvent, ContactId, EngineEvent, Rejection, Sample};
use virtual_touchpad::runtime::TokioTimers;
use virtual_touchpad::script::{self, Script};
use virtual_touchpad::timer::ManualTimers;
use virtual_touchpad::touchpad::{CaptureAuthority, EventSink, Touchpad};
use virtual_touchpad::TouchpadConfig;

/// Virtual Touchpad - analog stick emulation and click synthesis from pointer samples
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input script (YAML or JSON) to replay
    script: PathBuf,

    /// Path to configuration file (defaults are used if it does not exist)
    #[arg(short, long, default_value = "touchpad.yaml")]
    config: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Also write logs as JSON lines to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print events as JSON lines instead of colored text
    #[arg(long)]
    json: bool,

    /// Replay in wall-clock time with live timers and config hot-reload
    #[arg(long)]
    realtime: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Keep the guard alive so the file writer flushes on exit
    let _log_guard = init_logging(&args.log_level, args.log_file.as_deref())?;

    info!("Starting Virtual Touchpad...");
    info!("Script: {}", args.script.display());

    let script = Script::load(&args.script).await?;
    info!("Loaded {} steps spanning {}ms", script.steps.len(), script.duration_ms());

    let output = Output { json: args.json };

    if args.realtime {
        run_realtime(&args.config, &script, output).await?;
    } else {
        let config = load_config(&args.config).await?;
        let mut touchpad = Touchpad::from_config(&config, ManualTimers::new(), ConsoleSink::new(output))
            .with_capture(ConsoleCapture::new(output));

        script::replay(&mut touchpad, &script);

        let sink = touchpad.sink();
        info!(
            "Replay finished: {} analog updates, {} clicks, {} double clicks",
            sink.analog_updates, sink.clicks, sink.double_clicks
        );
    }

    info!("Virtual Touchpad shutdown complete");
    Ok(())
}

/// Load the config file, falling back to defaults when it does not exist
async fn load_config(path: &Path) -> Result<TouchpadConfig> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        let config = TouchpadConfig::load(path).await?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    } else {
        info!("No configuration at {}, using defaults", path.display());
        Ok(TouchpadConfig::default())
    }
}

async fn run_realtime(config_path: &Path, script: &Script, output: Output) -> Result<()> {
    let (mut config_watcher, initial_config) = if tokio::fs::try_exists(config_path).await.unwrap_or(false) {
        let (watcher, config) = ConfigWatcher::new(config_path).await?;
        info!("Configuration loaded successfully with hot-reload enabled");
        (Some(watcher), (*config).clone())
    } else {
        info!("No configuration at {}, using defaults", config_path.display());
        (None, TouchpadConfig::default())
    };

    let (timers, mut timer_rx) = TokioTimers::new();
    let mut touchpad = Touchpad::from_config(&initial_config, timers, ConsoleSink::new(output))
        .with_capture(ConsoleCapture::new(output));

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let start = tokio::time::Instant::now();
    let mut steps = script.steps.iter().peekable();

    info!("Starting realtime replay...");

    loop {
        let idle = touchpad.engine().timers().active_count() == 0 && timer_rx.is_empty();
        if steps.peek().is_none() && idle {
            info!("Script finished and all click windows closed");
            break;
        }

        let next_at = steps.peek().map(|step| start + Duration::from_millis(step.at_ms));

        tokio::select! {
            // Next scripted input is due
            _ = tokio::time::sleep_until(next_at.unwrap_or(start)), if next_at.is_some() => {
                if let Some(step) = steps.next() {
                    debug!("Replaying step at {}ms", step.at_ms);
                    script::apply_step(&mut touchpad, step);
                }
            }

            // Click and double-click windows expiring
            Some(fired) = timer_rx.recv() => {
                debug!("Timer fired: {} ({:?})", fired.handle, fired.token.kind);
                touchpad.timer_fired(fired);
            }

            // Handle config reload
            Some(new_config) = next_config(&mut config_watcher) => {
                info!("Configuration file changed, applying...");
                touchpad.apply_config(&new_config);
            }

            // Handle shutdown signal
            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping replay");
                break;
            }
        }
    }

    Ok(())
}

async fn next_config(watcher: &mut Option<ConfigWatcher>) -> Option<TouchpadConfig> {
    match watcher {
        Some(watcher) => watcher.next_config().await,
        None => std::future::pending().await,
    }
}

fn init_logging(level: &str, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    // stdout carries the event stream, so console logs go to stderr
    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("Log file path has no file name: {}", path.display()))?;

            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
            (Some(tracing_subscriber::fmt::layer().json().with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// How events are written to stdout
#[derive(Debug, Clone, Copy)]
struct Output {
    json: bool,
}

impl Output {
    fn print(&self, event: &EngineEvent) {
        if self.json {
            match serde_json::to_string(event) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Failed to serialize event: {}", e),
            }
            return;
        }

        match event {
            EngineEvent::CaptureRequested { id } => println!("{} {}", "capture".dimmed(), id),
            EngineEvent::CaptureReleased { id } => println!("{} {}", "release".dimmed(), id),
            EngineEvent::ContactRejected { id, reason } => {
                println!("{} {} ({})", "rejected".red(), id, reason)
            }
            EngineEvent::AnalogUpdated { id, analog } => println!(
                "{} {} x={} y={}",
                "analog".cyan(),
                id,
                format!("{:+.2}", analog.x).green(),
                format!("{:+.2}", analog.y).green()
            ),
            EngineEvent::Click(click) => println!(
                "{} {} button={} count={} at ({:.1}, {:.1})",
                "click".bold().yellow(),
                click.id,
                click.button,
                click.count,
                click.position.x,
                click.position.y
            ),
            EngineEvent::DoubleClick(click) => println!(
                "{} {} button={} count={} at ({:.1}, {:.1})",
                "dblclick".bold().magenta(),
                click.id,
                click.button,
                click.count,
                click.position.x,
                click.position.y
            ),
        }
    }
}

/// Prints everything the touchpad emits and keeps running totals
struct ConsoleSink {
    output: Output,
    analog_updates: usize,
    clicks: usize,
    double_clicks: usize,
}

impl ConsoleSink {
    fn new(output: Output) -> Self {
        Self {
            output,
            analog_updates: 0,
            clicks: 0,
            double_clicks: 0,
        }
    }
}

impl EventSink for ConsoleSink {
    fn analog_updated(&mut self, id: ContactId, analog: Analog) {
        self.analog_updates += 1;
        self.output.print(&EngineEvent::AnalogUpdated { id, analog });
    }

    fn click(&mut self, event: &ClickEvent, _echo: &mut Vec<Sample>) {
        self.clicks += 1;
        self.output.print(&EngineEvent::Click(*event));
    }

    fn double_click(&mut self, event: &ClickEvent, _echo: &mut Vec<Sample>) {
        self.double_clicks += 1;
        self.output.print(&EngineEvent::DoubleClick(*event));
    }

    fn contact_rejected(&mut self, id: ContactId, reason: Rejection) {
        self.output.print(&EngineEvent::ContactRejected { id, reason });
    }
}

/// Capture is only reported; the console has nothing to grab
struct ConsoleCapture {
    output: Output,
}

impl ConsoleCapture {
    fn new(output: Output) -> Self {
        Self { output }
    }
}

impl CaptureAuthority for ConsoleCapture {
    fn begin_capture(&mut self, id: ContactId) {
        self.output.print(&EngineEvent::CaptureRequested { id });
    }

    fn end_capture(&mut self, id: ContactId) {
        self.output.print(&EngineEvent::CaptureReleased { id });
    }
}

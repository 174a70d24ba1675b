//! `botpanel-cli` – headless control panel runner.
//!
//! This binary:
//!
//! 1. Initialises tracing (console, optional OTLP export).
//! 2. Loads `~/.botpanel/config.toml` (or `BOTPANEL_CONFIG`) with
//!    `BOTPANEL_*` overrides; `--init` writes the defaults and exits.
//! 3. Selects the transport named in the config, starts every pipeline and
//!    renders updates to the terminal (and to BMP snapshots with
//!    `--snapshots <dir>`).
//! 4. Accepts `/detect`, `/status` and `/quit` on stdin and stops cleanly
//!    on Ctrl-C.

mod console;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use botpanel_middleware::{BusTransport, EventBus, RosbridgeTransport, SimTransport, Transport};
use botpanel_perception::{BrightRegionDetector, DetectionToggle};
use botpanel_runtime::telemetry::init_tracing;
use botpanel_runtime::{ChannelSink, ControlPanel, PanelConfig, PanelHandle, TransportKind, config};
use botpanel_types::PanelError;
use clap::Parser;
use colored::Colorize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use console::Command;
use render::HeadlessRenderer;

fn main() -> ExitCode {
    let _guard = init_tracing("botpanel");

    let args = Args::parse();

    print_banner();

    if args.init {
        return match write_default_config() {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{}: {}", "Config error".red(), e);
                ExitCode::FAILURE
            }
        };
    }

    let cfg = match config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            return ExitCode::FAILURE;
        }
    };
    let path = config::config_path();
    if path.exists() {
        println!("  Config loaded from {}", path.display().to_string().bold());
    } else {
        println!(
            "  No config at {}; using defaults (run `{}` to write one).",
            path.display().to_string().dimmed(),
            "botpanel --init".bold()
        );
    }

    // The runtime is built after tracing so the simple OTLP exporter never
    // needs a reactor at init time.
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start runtime".red(), e);
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(cfg, args));
    // stdin reads sit on a blocking thread that never returns on its own.
    runtime.shutdown_timeout(Duration::from_millis(250));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "Panel error".red(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: PanelConfig, args: Args) -> Result<(), PanelError> {
    if let Some(dir) = &args.snapshots {
        std::fs::create_dir_all(dir).map_err(|e| {
            PanelError::Config(format!("cannot create snapshot dir {}: {e}", dir.display()))
        })?;
    }

    let transport = build_transport(&cfg);
    println!(
        "  Transport: {}   detection: {}",
        transport.name().bold(),
        if cfg.detection_enabled { "on".green() } else { "off".dimmed() }
    );

    let (sink, updates) = ChannelSink::new();
    let panel = ControlPanel::new(cfg, transport, Arc::new(sink), Arc::new(BrightRegionDetector));
    let toggle = panel.detection_toggle();
    let handle = panel.start();
    let renderer = tokio::spawn(HeadlessRenderer::new(args.snapshots).run(updates));

    let (commands_tx, mut commands) = mpsc::unbounded_channel();
    let ctrlc_tx = commands_tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        let _ = ctrlc_tx.send(Command::Quit);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; use /quit to stop");
    }
    if !args.no_console {
        tokio::spawn(console::run(commands_tx.clone()));
        println!("  Type {} for a list of commands.\n", "/help".bold().cyan());
    }

    serve_commands(&mut commands, &toggle, &handle).await;
    // Held until here so the loop only ends on an explicit quit, even with
    // no console and no Ctrl-C handler.
    drop(commands_tx);
    handle.shutdown().await;
    drop(panel);
    match renderer.await {
        Ok(stats) => println!(
            "  {} rendered {} rgb, {} depth, {} battery, {} frame-tree update(s)",
            "✓".green().bold(),
            stats.rgb,
            stats.depth,
            stats.battery,
            stats.frames
        ),
        Err(e) => warn!(error = %e, "renderer task ended abnormally"),
    }
    Ok(())
}

/// Act on operator commands until a quit arrives or every sender is gone.
async fn serve_commands(
    commands: &mut mpsc::UnboundedReceiver<Command>,
    toggle: &DetectionToggle,
    handle: &PanelHandle,
) {
    while let Some(command) = commands.recv().await {
        match command {
            Command::ToggleDetection => {
                let enabled = toggle.toggle();
                info!(enabled, "face detection toggled");
                println!("  Face detection {}", if enabled { "on".green() } else { "off".dimmed() });
            }
            Command::Status => {
                println!("  Running pipelines: {}", handle.active().join(", ").bold());
            }
            Command::Quit => break,
        }
    }
}

/// Pick the message source named in the config.
fn build_transport(cfg: &PanelConfig) -> Arc<dyn Transport> {
    match cfg.transport {
        TransportKind::Sim => Arc::new(SimTransport::new(cfg.topics.depth.clone())),
        TransportKind::Rosbridge => Arc::new(RosbridgeTransport::new(cfg.rosbridge_url.clone())),
        TransportKind::Bus => {
            warn!("bus transport selected; nothing in this process publishes to it");
            Arc::new(BusTransport::new(EventBus::default()))
        }
    }
}

fn write_default_config() -> Result<(), PanelError> {
    let path = config::config_path();
    if path.exists() {
        println!("  Config already exists at {}", path.display().to_string().bold());
        return Ok(());
    }
    config::save_to(&PanelConfig::default(), &path)?;
    println!(
        "  {} Config written to {}",
        "✓".green().bold(),
        path.display().to_string().bold()
    );
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Arguments
// ─────────────────────────────────────────────────────────────────────────────

/// Headless robot sensor control panel.
#[derive(Debug, Parser)]
#[command(name = "botpanel", version, about)]
struct Args {
    /// Write the default config to the config path and exit
    #[arg(long)]
    init: bool,

    /// Save the latest RGB and depth frames as BMP files in this directory
    #[arg(long, value_name = "DIR")]
    snapshots: Option<PathBuf>,

    /// Do not read panel commands from stdin
    #[arg(long)]
    no_console: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("  {} {}",
        "botpanel".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Robot sensor control panel");
    println!();
}

//! overlay-panels - overlay panel core for host-owned window trees
//!
//! Drives the size control and item spawner panels against an in-memory host:
//! layout queries, scripted host sessions and config validation.

mod config;
mod core;
mod error;
mod host;
mod layout;
mod panels;

use anyhow::{Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::host::NodeKind;
use crate::host::script::{Scenario, ScenarioRunner, StepReport};
use crate::layout::{GridSpec, ScrollLayoutState};

#[derive(ClapParser)]
#[command(name = "overlay-panels")]
#[command(about = "Overlay panel lifecycle, layout and request coordination", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Custom data directory (default: ~/.overlay-panels)
    /// Can also be set via OVERLAY_PANELS_DIR environment variable
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the scroll layout of an item grid
    Layout {
        /// Number of items in the grid
        #[arg(long)]
        items: usize,

        /// Columns (default: inventory grid from config)
        #[arg(long)]
        columns: Option<usize>,

        #[arg(long)]
        cell_height: Option<f32>,

        #[arg(long)]
        spacing_y: Option<f32>,

        /// Viewport height in pixels
        #[arg(long)]
        viewport: Option<f32>,
    },
    /// Replay a scripted host session (default: built-in scenario)
    Simulate {
        #[arg(value_name = "SCRIPT")]
        script: Option<PathBuf>,

        /// Wall-clock delay between steps in milliseconds
        #[arg(long, default_value_t = 0)]
        pace_ms: u64,
    },
    /// Load the configuration and report problems
    ValidateConfig {
        /// Write the repaired config back to the file
        #[arg(long)]
        fix: bool,
    },
}

fn init_logging() -> Result<()> {
    // stdout carries command output, so logs go to a file
    let log_path = Config::log_path().unwrap_or_else(|_| PathBuf::from("overlay-panels.log"));
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)
            .context(format!("Failed to create log directory {:?}", parent))?;
    }
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context(format!("Failed to open log file {:?}", log_path))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false) // No color codes in log file
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(dir) = &cli.data_dir {
        std::env::set_var("OVERLAY_PANELS_DIR", dir);
    }
    init_logging()?;

    match cli.command {
        Some(Commands::Layout {
            items,
            columns,
            cell_height,
            spacing_y,
            viewport,
        }) => {
            let config = load_config(&cli.config)?;
            run_layout(&config, items, columns, cell_height, spacing_y, viewport)
        }
        Some(Commands::Simulate { script, pace_ms }) => {
            let config = load_config(&cli.config)?;
            run_simulation(config, script, Duration::from_millis(pace_ms))
        }
        Some(Commands::ValidateConfig { fix }) => validate_config(&cli.config, fix),
        None => {
            let config = load_config(&cli.config)?;
            run_simulation(config, None, Duration::ZERO)
        }
    }
}

fn load_config(path: &Option<PathBuf>) -> Result<Config> {
    let config = match Config::load(path.as_deref()) {
        Ok(config) => config,
        // A broken profile config falls back to the shipped defaults; an
        // explicit --config does not
        Err(e) if path.is_none() => {
            tracing::warn!("Profile config unusable, using shipped defaults: {:#}", e);
            eprintln!("Warning: {:#}; using shipped defaults", e);
            Config::embedded_default()?
        }
        Err(e) => return Err(e),
    };
    tracing::info!("Loaded config from {:?}", config.source);
    Ok(config)
}

fn run_layout(
    config: &Config,
    items: usize,
    columns: Option<usize>,
    cell_height: Option<f32>,
    spacing_y: Option<f32>,
    viewport: Option<f32>,
) -> Result<()> {
    let base = config.layout.inventory_grid;
    let mut grid: GridSpec = base.grid();
    if let Some(columns) = columns {
        grid.columns = columns;
    }
    if let Some(height) = cell_height {
        grid.cell.height = height;
    }
    if let Some(spacing) = spacing_y {
        grid.spacing.y = spacing;
    }
    let viewport = viewport.unwrap_or(base.viewport_height);

    let state = ScrollLayoutState::new(grid, items, viewport)?;
    println!("items:            {}", state.item_count());
    println!("columns:          {}", grid.columns);
    println!("rows:             {}", state.rows());
    println!("content extent:   {}", state.content_extent());
    println!("viewport extent:  {}", state.viewport_extent());
    println!("scrollbar needed: {}", state.scrollbar_needed());
    println!("handle ratio:     {:.3}", state.handle_ratio());
    Ok(())
}

fn run_simulation(config: Config, script: Option<PathBuf>, pace: Duration) -> Result<()> {
    let scenario = match &script {
        Some(path) => {
            println!("Replaying scenario {:?}", path);
            Scenario::load(path)?
        }
        None => {
            println!("Replaying built-in scenario");
            Scenario::embedded_default()?
        }
    };
    tracing::info!("Simulating {} steps", scenario.steps.len());

    let mut runner = ScenarioRunner::new(&scenario, config);
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(runner.play(&scenario.steps, pace, print_report));

    let host = runner.host();
    let system = runner.system();
    println!();
    println!(
        "Inventory: {} slots, {} items, {} calls, {} unanswered",
        host.inventory
            .size()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string()),
        host.inventory.items().len(),
        host.inventory.calls(),
        host.inventory.queued()
    );
    println!(
        "Requests: {} pending, {} stale results discarded; {} deferred tasks left",
        system.coordinator().pending_count(),
        system.coordinator().discarded_count(),
        system.pending_tasks()
    );
    println!(
        "Host tree: {} frames, {} live nodes ({} awaiting end of frame), {} scrollbars",
        host.ui.frames(),
        host.ui.live_node_count(),
        host.ui.node_count() - host.ui.live_node_count(),
        host.ui.count_kind(NodeKind::Scrollbar)
    );
    Ok(())
}

fn print_report(report: &StepReport) {
    let outcome = match &report.outcome {
        Ok(detail) if detail.is_empty() => String::new(),
        Ok(detail) => format!(" -> {}", detail),
        Err(message) => format!(" !! {}", message),
    };
    let resolved = if report.resolutions > 0 {
        format!(" ({} resolved)", report.resolutions)
    } else {
        String::new()
    };
    println!(
        "[{:>7.3}s] #{:02} {}{}{}",
        report.elapsed.as_secs_f32(),
        report.index,
        report.description,
        outcome,
        resolved
    );
    for panel in &report.panels {
        let state = match (panel.live, panel.visible) {
            (true, true) => "live, shown",
            (true, false) => "live, hidden",
            (false, _) => "absent",
        };
        let status = if panel.status.is_empty() {
            String::new()
        } else {
            format!("  \"{}\"", panel.status)
        };
        let content = if panel.content.is_empty() {
            String::new()
        } else {
            format!("  [{}]", panel.content)
        };
        println!(
            "            {:<13} {:<12} {}{}{}",
            panel.kind.display_name(),
            state,
            panel.generation,
            content,
            status
        );
    }
    for host_panel in &report.host_panels {
        if host_panel.instances > 1 {
            println!(
                "            !! {} {} roots in the host tree",
                host_panel.instances,
                host_panel.kind.display_name()
            );
        }
    }
}

fn validate_config(path: &Option<PathBuf>, fix: bool) -> Result<()> {
    let config_path = match path {
        Some(path) => path.clone(),
        None => Config::config_path()?,
    };
    println!("Validating config file: {:?}", config_path);

    let contents = std::fs::read_to_string(&config_path)
        .context(format!("Failed to read config file: {:?}", config_path))?;
    let raw: Config = toml::from_str(&contents)
        .context(format!("Failed to parse config file: {:?}", config_path))?;

    let mut general = raw.general.clone();
    let notes = general.normalize_quantities();
    let validation = raw.validate();

    if !validation.has_errors() && notes.is_empty() {
        println!("✓ Config is valid");
        return Ok(());
    }
    for note in &notes {
        println!("  ⚠ {}", note);
    }
    for error in validation.errors() {
        println!("  ✗ {}", error.message());
    }

    if fix {
        let mut repaired = Config::from_toml_str(&contents)
            .context(format!("Failed to repair config file: {:?}", config_path))?;
        repaired.source = Some(config_path.clone());
        repaired.save()?;
        println!("✓ Wrote repaired config to {:?}", config_path);
    } else {
        println!("Problems are fixed with defaults when the config is loaded; pass --fix to save them");
    }
    Ok(())
}

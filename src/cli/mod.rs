use std::env;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ConfigLoader;
use crate::dataset::DatasetLoader;

pub mod commands;

use self::commands::{LayoutArgs, TagsArgs, ViewArgs};

#[derive(Parser, Debug)]
#[command(
    name = "timeline",
    version,
    about = "Zoomable terminal timeline of dated events and periods"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over TIMELINE_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the timeline data directory (takes precedence over TIMELINE_DATA)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open the interactive viewer (default)
    View(ViewArgs),
    /// List timelines in the data directory
    List,
    /// Print the tags of a timeline with item counts
    Tags(TagsArgs),
    /// Compute a layout without a terminal and print it
    Layout(LayoutArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var("TIMELINE_CONFIG", path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var("TIMELINE_DATA", path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();

    let command = cli
        .command
        .unwrap_or(Commands::View(ViewArgs::default()));
    let log_file = match command {
        Commands::View(_) => Some(paths.log_dir.join("timeline.log")),
        _ => None,
    };
    init_tracing(&cli.log_level, log_file.as_deref())
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;

    let config = Arc::new(loader.load_or_init()?);
    let datasets = DatasetLoader::from_config(&paths, &config.data);
    if datasets.list_available()?.is_empty() {
        datasets.seed_bundled()?;
    }

    match command {
        Commands::View(args) => commands::run_viewer(config, &datasets, args),
        Commands::List => commands::list_timelines(&datasets),
        Commands::Tags(args) => commands::show_tags(&datasets, args),
        Commands::Layout(args) => commands::print_layout(config, &datasets, args),
    }
}

/// Installs the global subscriber once. The viewer owns the terminal, so it
/// logs to `file` instead of stderr.
fn init_tracing(level: &str, file: Option<&Path>) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        match file {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("opening log file {}", path.display()))?;
                fmt()
                    .with_env_filter(env_filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .init();
            }
            None => {
                fmt()
                    .with_env_filter(env_filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
        }
        Ok::<(), anyhow::Error>(())
    })
    .map(|_| ())
}

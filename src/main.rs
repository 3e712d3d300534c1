use std::path::PathBuf;
use std::process::exit;

use clap::Parser;
use log::{error, info};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use bakrotd::{Rotator, RotatorError, Settings};

/// Streams managed when neither a settings file nor `--family` is given.
const DEFAULT_FAMILIES: [&str; 4] = ["ipstrc", "pdtrc", "ipmgr", "inttrc"];
const DEFAULT_WATCH_DIR: &str = "var/log";

#[derive(Debug, Parser)]
#[command(
    name = "bakrotd",
    version,
    about = "Rotates and archives .bak log sentinels"
)]
struct Cli {
    /// TOML settings file; the flags below override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory to watch for sentinels (must exist).
    #[arg(short = 'd', long)]
    watch_dir: Option<PathBuf>,

    /// Log family token; repeat for several families.
    #[arg(short = 'f', long = "family")]
    families: Vec<String>,

    /// Largest generation index kept on disk.
    #[arg(long)]
    max_files: Option<u32>,

    /// Keep the prior archive when a new one is produced.
    #[arg(long)]
    keep_obsolete_archives: bool,

    /// Keep generation files after they have been archived.
    #[arg(long)]
    keep_obsolete_logs: bool,
}

fn assemble_settings(cli: &Cli) -> Result<Settings, RotatorError> {
    let mut settings = match &cli.config {
        Some(path) => Settings::try_from_toml_file(path)?,
        None => Settings::new(
            DEFAULT_WATCH_DIR,
            DEFAULT_FAMILIES.iter().map(|s| (*s).to_owned()).collect(),
        ),
    };
    if let Some(dir) = &cli.watch_dir {
        settings.watch_dir = dir.clone();
    }
    if !cli.families.is_empty() {
        settings.families = cli.families.clone();
    }
    if let Some(max_files) = cli.max_files {
        settings.max_files = max_files;
    }
    if cli.keep_obsolete_archives {
        settings.delete_obsolete_archives = false;
    }
    if cli.keep_obsolete_logs {
        settings.delete_obsolete_logs = false;
    }
    Ok(settings)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let settings = match assemble_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", e);
            exit(2);
        }
    };

    let rotator = match Rotator::start(settings) {
        Ok(rotator) => rotator,
        Err(e) => {
            error!("cannot start: {}", e);
            exit(1);
        }
    };

    let mut signals = match Signals::new([SIGINT, SIGTERM]) {
        Ok(signals) => signals,
        Err(e) => {
            error!("cannot register signal handlers: {}", e);
            exit(1);
        }
    };
    if let Some(signal) = signals.forever().next() {
        info!("received signal {}, shutting down", signal);
    }

    rotator.shutdown();
}

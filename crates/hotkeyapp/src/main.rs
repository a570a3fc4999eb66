#![cfg_attr(not(windows), allow(dead_code))]

mod actions;
mod layout_swap;
mod logging;
#[cfg(windows)]
mod runtime;
mod settings;

use anyhow::{Context, Result};
use clap::Parser;
use settings::Settings;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "hotkeyapp", version, about)]
struct Cli {
    /// Settings file (default: <config dir>/hotkeyapp/settings.json)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the default settings as JSON and exit
    #[arg(long)]
    print_default_config: bool,

    /// Write the default settings to the settings file and exit
    #[arg(long, conflicts_with = "print_default_config")]
    write_default_config: bool,
}

enum LoadNote {
    Loaded(PathBuf),
    Missing(PathBuf),
    Invalid(anyhow::Error),
    NoConfigDir,
}

fn load_settings(path: Option<PathBuf>) -> (Settings, LoadNote) {
    let Some(path) = path else {
        return (Settings::default(), LoadNote::NoConfigDir);
    };
    match Settings::load(&path) {
        Ok(Some(settings)) => (settings, LoadNote::Loaded(path)),
        Ok(None) => (Settings::default(), LoadNote::Missing(path)),
        Err(e) => (Settings::default(), LoadNote::Invalid(e)),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", serde_json::to_string_pretty(&Settings::default())?);
        return Ok(());
    }

    let config_path = cli.config.or_else(Settings::default_path);
    if cli.write_default_config {
        let path = config_path.context("no config directory, pass --config")?;
        if path.exists() {
            anyhow::bail!("{} already exists", path.display());
        }
        Settings::default().save(&path)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let (mut settings, note) = load_settings(config_path);
    settings.apply_env(|key| std::env::var(key).ok());

    let _log_guard = logging::init(&settings.log)?;
    match note {
        LoadNote::Loaded(path) => tracing::info!("Loaded settings from {}", path.display()),
        LoadNote::Missing(path) => {
            tracing::info!("{} not found, using defaults", path.display())
        }
        LoadNote::Invalid(e) => tracing::warn!("{:#}; using defaults", e),
        LoadNote::NoConfigDir => tracing::warn!("No config directory, using defaults"),
    }

    run(settings)
}

#[cfg(windows)]
fn run(settings: Settings) -> Result<()> {
    runtime::run(settings)
}

#[cfg(not(windows))]
fn run(_settings: Settings) -> Result<()> {
    tracing::error!("Keyboard interception is only available on Windows");
    anyhow::bail!("unsupported platform")
}

mod pad;
mod replay;

use std::{
    env,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use firma_kiosk::{Kiosk, Platform, SaveOutcome};
use firma_ops::init_tracing;
use firma_persist::{BulkExporter, ExportMode};
use firma_types::{config::KioskConfig, geometry::CssSize};
use serde::Serialize;
use tracing::info;

#[derive(Parser)]
#[command(name = "firma", about = "Signature capture kiosk")]
struct Cli {
    /// Path to the kiosk TOML config (defaults to $FIRMA_CONFIG).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Terminal signature pad: drag with the mouse to sign.
    Pad,
    /// Replay strokes from a JSON file and save the signature.
    Sign { strokes: PathBuf },
    /// Download every stored signature.
    Export {
        /// Bundle everything into one ZIP archive.
        #[arg(long)]
        archive: bool,
    },
    /// Print the detected environment as JSON.
    Check,
}

#[derive(Serialize)]
struct CheckReport<'a> {
    environment: &'a firma_types::environment::Environment,
    badge: String,
    strategies: Vec<&'static str>,
    archive_supported: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref());
    if matches!(cli.command, Command::Pad) && config.ops.log_file.is_none() {
        config.ops.log_file = Some("firma-pad.log".into());
    }
    init_tracing(&config.ops)?;

    let platform = Platform::from_config(&config.persistence);
    let kiosk = Arc::new(Kiosk::boot(&config, platform).await?);

    match cli.command {
        Command::Pad => {
            let startup = Kiosk::spawn_startup_export(kiosk.clone());
            let css = CssSize::new(config.canvas.width, config.canvas.height);
            pad::run(kiosk.clone(), css, config.canvas.device_pixel_ratio).await?;
            if let Some(handle) = startup {
                handle.abort();
            }
        }
        Command::Sign { strokes } => {
            let strokes = replay::load(&strokes).await?;
            replay::draw(&kiosk, &strokes)?;
            let outcome = kiosk.request_save().await?;
            print_last_notice(&kiosk);
            match outcome {
                SaveOutcome::Saved(receipt) => {
                    info!("Signature stored at {}", receipt.location);
                }
                SaveOutcome::Failed(_) | SaveOutcome::NothingToSave | SaveOutcome::Busy => {
                    bail!("signature was not saved");
                }
            }
        }
        Command::Export { archive } => {
            let mode = if archive {
                ExportMode::Archive
            } else {
                ExportMode::Individual
            };
            let result = kiosk.request_export_all(mode).await;
            print_last_notice(&kiosk);
            result?;
        }
        Command::Check => {
            let report = CheckReport {
                environment: kiosk.environment(),
                badge: kiosk.status().badge(),
                strategies: config
                    .persistence
                    .effective_strategies()
                    .iter()
                    .map(|kind| kind.label())
                    .collect(),
                archive_supported: BulkExporter::archive_supported(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

fn print_last_notice(kiosk: &Kiosk) {
    if let Some(notice) = kiosk.status().last_notice() {
        println!("{}", notice.message());
    }
}

fn load_config(path: Option<&Path>) -> KioskConfig {
    let Some(path) = path
        .map(Path::to_path_buf)
        .or_else(|| env::var("FIRMA_CONFIG").ok().map(PathBuf::from))
    else {
        return KioskConfig::default();
    };
    match KioskConfig::from_file(&path) {
        Ok(cfg) => {
            if let Err(err) = cfg.validate() {
                eprintln!(
                    "Invalid config in '{}': {err}. Falling back to internal defaults.",
                    path.display()
                );
                KioskConfig::default()
            } else {
                cfg
            }
        }
        Err(err) => {
            eprintln!(
                "Failed to load config from '{}': {err}. Falling back to internal defaults.",
                path.display()
            );
            KioskConfig::default()
        }
    }
}

//! Operational helpers: logging setup, the status channel and the badge.

pub mod status;

use std::{fs::OpenOptions, sync::Mutex};

use firma_types::{
    config::{OpsConfig, StrategyKind},
    environment::{DisplayMode, Environment},
    FirmaError, Result,
};
use tracing_subscriber::{fmt, EnvFilter};

pub use status::StatusBoard;

pub fn init_tracing(config: &OpsConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_level.clone())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| FirmaError::Ops(format!("failed to create log filter: {err}")))?;

    let builder = fmt().with_env_filter(filter);
    let installed = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|err| FirmaError::Ops(format!("cannot open log file {path}: {err}")))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    installed.map_err(|err| FirmaError::Ops(format!("tracing init error: {err}")))?;
    Ok(())
}

/// Badge shown before capabilities are known.
pub fn startup_badge(mode: DisplayMode) -> String {
    mode.label().to_string()
}

/// Badge after capability detection: host plus where saves will land, taken
/// from the first configured strategy this environment can run.
pub fn environment_badge(env: &Environment, strategies: &[StrategyKind]) -> String {
    let usable = strategies
        .iter()
        .find(|kind| **kind != StrategyKind::Silent || env.supports_silent());
    let storage = match usable {
        Some(StrategyKind::Silent) => "almacenamiento privado",
        Some(StrategyKind::Directory) => "carpeta",
        Some(StrategyKind::Download) => "solo descarga",
        None if env.private_session => "incógnito",
        None => "sin almacenamiento",
    };
    format!("{} · {storage}", env.display_mode.label())
}

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{environment::DisplayMode, image::RenderMode, FirmaError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// `#rrggbb`; switch to white when the artwork is dark.
    pub stroke_color: String,
    /// Line width in css pixels.
    pub stroke_width: f32,
    pub width: f32,
    pub height: f32,
    pub device_pixel_ratio: f32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            stroke_color: "#000000".into(),
            stroke_width: 5.0,
            width: 540.0,
            height: 960.0,
            device_pixel_ratio: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub width: u32,
    pub height: u32,
    pub mode: RenderMode,
    /// Artwork drawn under the ink in stamped mode.
    pub background: Option<String>,
    pub filename_prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            mode: RenderMode::SignatureOnly,
            background: None,
            filename_prefix: "firma_".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleConfig {
    /// Zero disables the idle guard.
    pub auto_clear_seconds: u64,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            auto_clear_seconds: 15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Silent,
    Directory,
    Download,
}

impl StrategyKind {
    pub fn label(&self) -> &'static str {
        match self {
            StrategyKind::Silent => "silent",
            StrategyKind::Directory => "directory",
            StrategyKind::Download => "download",
        }
    }
}

/// Save policies the kiosk has been deployed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentVariant {
    DownloadOnly,
    SilentOnly,
    SilentWithFallback,
    SilentWithFallbackQuiet,
    #[default]
    Diagnosed,
    DirectoryOnly,
}

impl DeploymentVariant {
    pub fn strategies(&self) -> Vec<StrategyKind> {
        match self {
            DeploymentVariant::DownloadOnly => vec![StrategyKind::Download],
            DeploymentVariant::SilentOnly => vec![StrategyKind::Silent],
            DeploymentVariant::SilentWithFallback | DeploymentVariant::SilentWithFallbackQuiet => {
                vec![StrategyKind::Silent, StrategyKind::Download]
            }
            DeploymentVariant::Diagnosed => vec![StrategyKind::Silent],
            DeploymentVariant::DirectoryOnly => vec![StrategyKind::Directory],
        }
    }

    /// Whether strategies are checked against the capability snapshot before
    /// being invoked.
    pub fn prechecks(&self) -> bool {
        matches!(self, DeploymentVariant::Diagnosed)
    }

    /// Whether failure reasons reach the status line.
    pub fn surfaces_diagnostics(&self) -> bool {
        !matches!(self, DeploymentVariant::SilentWithFallbackQuiet)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub variant: DeploymentVariant,
    /// Overrides the variant's strategy order when set.
    pub strategies: Option<Vec<StrategyKind>>,
    pub collection: String,
    /// Root of the origin-private store; unset means no storage capability.
    pub origin_root: Option<String>,
    pub download_dir: String,
    /// Folder handed out by the directory prompt; unset means dismissed.
    pub folder: Option<String>,
    pub release_delay_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            variant: DeploymentVariant::default(),
            strategies: None,
            collection: "firmas".into(),
            origin_root: Some("kiosk-data".into()),
            download_dir: "descargas".into(),
            folder: None,
            release_delay_ms: 1500,
        }
    }
}

impl PersistenceConfig {
    pub fn effective_strategies(&self) -> Vec<StrategyKind> {
        self.strategies
            .clone()
            .unwrap_or_else(|| self.variant.strategies())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkConfig {
    pub archive_name: String,
    pub stagger_ms: u64,
    /// Run an archive export shortly after startup.
    pub export_on_start: bool,
    pub startup_delay_ms: u64,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            archive_name: "firmas.zip".into(),
            stagger_ms: 300,
            export_on_start: false,
            startup_delay_ms: 800,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub toast_ms: u64,
    pub history: usize,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            toast_ms: 2000,
            history: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub secure_context: bool,
    pub display_mode: DisplayMode,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            secure_context: true,
            display_mode: DisplayMode::Browser,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpsConfig {
    pub log_level: String,
    pub log_file: Option<String>,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            log_file: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    pub canvas: CanvasConfig,
    pub output: OutputConfig,
    pub idle: IdleConfig,
    pub persistence: PersistenceConfig,
    pub bulk: BulkConfig,
    pub status: StatusConfig,
    pub environment: EnvironmentConfig,
    pub ops: OpsConfig,
}

impl KioskConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            FirmaError::Configuration(format!(
                "unable to read config file {}: {err}",
                path_ref.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|err| {
            FirmaError::Configuration(format!(
                "failed to parse config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if parse_hex_color(&self.canvas.stroke_color).is_none() {
            return Err(FirmaError::Configuration(format!(
                "canvas.stroke_color must be #rrggbb, got {:?}",
                self.canvas.stroke_color
            )));
        }
        if self.canvas.stroke_width <= 0.0 {
            return Err(FirmaError::Configuration(
                "canvas.stroke_width must be greater than zero".into(),
            ));
        }
        if self.canvas.width <= 0.0 || self.canvas.height <= 0.0 {
            return Err(FirmaError::Configuration(
                "canvas.width and canvas.height must be greater than zero".into(),
            ));
        }
        if self.output.width == 0 || self.output.height == 0 {
            return Err(FirmaError::Configuration(
                "output.width and output.height must be greater than zero".into(),
            ));
        }
        if self.persistence.collection.trim().is_empty() {
            return Err(FirmaError::Configuration(
                "persistence.collection must not be empty".into(),
            ));
        }
        if self.persistence.effective_strategies().is_empty() {
            return Err(FirmaError::Configuration(
                "persistence.strategies must list at least one strategy".into(),
            ));
        }
        if self.bulk.archive_name.trim().is_empty() {
            return Err(FirmaError::Configuration(
                "bulk.archive_name must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Parses `#rrggbb` into opaque RGBA.
pub fn parse_hex_color(value: &str) -> Option<[u8; 4]> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    Some([channel(0..2)?, channel(2..4)?, channel(4..6)?, 255])
}

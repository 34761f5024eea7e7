//! Signature kiosk controller: the one object the input adapter talks to.
//!
//! Inbound surface: `on_pointer_down/move/up`, `request_save`,
//! `request_clear`, `request_export_all` and `resize`. Everything else
//! (canvas, idle guard, strategies, exporter, status line) hangs off the
//! [`Kiosk`] instance created once per widget.
//!
//! The pointer handlers are synchronous, but the idle countdown they arm runs
//! on the ambient tokio runtime; called from plain threads they still record
//! ink and the countdown is skipped.

pub mod guard;
pub mod platform;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};

use firma_canvas::{Rasterizer, SignatureCanvas, StrokeRecorder, StrokeSession, StrokeStyle};
use firma_ops::{environment_badge, startup_badge, StatusBoard};
use firma_persist::{
    BulkExporter, DirectoryStrategy, DownloadStrategy, ExportMode, ExportOutcome,
    PersistencePolicy, SaveReceipt, SaveResolution, SilentStrategy, StrategySelector,
};
use firma_storage::detect_environment;
use firma_types::{
    config::{BulkConfig, KioskConfig},
    diagnostic::Diagnostic,
    environment::Environment,
    geometry::{CssSize, Point, PointerInput},
    image::RenderMode,
    naming::SignatureNamer,
    status::Notice,
    FirmaError, Result,
};
use tokio::{
    task::JoinHandle,
    time::{sleep, Duration},
};
use tracing::{debug, info, warn};

pub use guard::IdleGuard;
pub use platform::Platform;

/// What a save request came to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(SaveReceipt),
    NothingToSave,
    /// Reason is `None` when the policy hides diagnostics.
    Failed(Option<Diagnostic>),
    /// Another save is still running.
    Busy,
}

pub struct Kiosk {
    recorder: Arc<Mutex<StrokeRecorder>>,
    guard: IdleGuard,
    rasterizer: Rasterizer,
    render_mode: RenderMode,
    selector: StrategySelector,
    exporter: BulkExporter,
    namer: SignatureNamer,
    status: StatusBoard,
    environment: Environment,
    saving: AtomicBool,
    bulk: BulkConfig,
}

impl Kiosk {
    /// Detects the environment, then builds the kiosk around it.
    pub async fn boot(config: &KioskConfig, platform: Platform) -> Result<Self> {
        let status = StatusBoard::new(&config.status);
        status.set_badge(startup_badge(config.environment.display_mode));
        let environment = detect_environment(
            config.environment.secure_context,
            config.environment.display_mode,
            platform.origin.as_deref(),
        )
        .await;
        Self::assemble(config, platform, environment, status)
    }

    /// Builds the kiosk for an already known capability snapshot.
    pub fn with_environment(
        config: &KioskConfig,
        platform: Platform,
        environment: Environment,
    ) -> Result<Self> {
        Self::assemble(
            config,
            platform,
            environment,
            StatusBoard::new(&config.status),
        )
    }

    fn assemble(
        config: &KioskConfig,
        platform: Platform,
        environment: Environment,
        status: StatusBoard,
    ) -> Result<Self> {
        config.validate()?;
        status.set_badge(environment_badge(
            &environment,
            &config.persistence.effective_strategies(),
        ));

        let recorder = StrokeRecorder::new(
            SignatureCanvas::from_config(&config.canvas),
            StrokeStyle::from_config(&config.canvas)?,
        );
        let persistence = &config.persistence;
        let release_after = Duration::from_millis(persistence.release_delay_ms);
        let selector = StrategySelector::new(PersistencePolicy::from_config(persistence))
            .register(Arc::new(SilentStrategy::new(
                platform.origin.clone(),
                persistence.collection.clone(),
            )))
            .register(Arc::new(DirectoryStrategy::new(platform.folders.clone())))
            .register(Arc::new(DownloadStrategy::new(
                platform.downloads.clone(),
                release_after,
            )));
        let exporter = BulkExporter::new(
            platform.origin.clone(),
            platform.downloads.clone(),
            persistence.collection.clone(),
        )
        .with_config(&config.bulk, release_after);

        info!(
            "Kiosk ready: strategies {:?}, idle clear {}s",
            selector.policy().strategies,
            config.idle.auto_clear_seconds
        );
        Ok(Self {
            recorder: Arc::new(Mutex::new(recorder)),
            guard: IdleGuard::from_seconds(config.idle.auto_clear_seconds),
            rasterizer: Rasterizer::from_config(&config.output),
            render_mode: config.output.mode,
            selector,
            exporter,
            namer: SignatureNamer::new(config.output.filename_prefix.clone()),
            status,
            environment,
            saving: AtomicBool::new(false),
            bulk: config.bulk.clone(),
        })
    }

    /// Swaps the rasterizer, e.g. to preload artwork or change encoders.
    pub fn with_rasterizer(mut self, rasterizer: Rasterizer) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn status(&self) -> &StatusBoard {
        &self.status
    }

    pub fn session(&self) -> Result<StrokeSession> {
        Ok(self.lock_recorder()?.session().clone())
    }

    /// Coarse ink map of the live canvas for low-resolution displays.
    pub fn preview(&self, cols: u16, rows: u16) -> Result<Vec<Vec<bool>>> {
        Ok(self.lock_recorder()?.canvas().coverage(cols, rows))
    }

    /// Client position of the drawing surface's top-left corner.
    pub fn set_surface_origin(&self, origin: Point) -> Result<()> {
        self.lock_recorder()?.set_origin(origin);
        Ok(())
    }

    pub fn on_pointer_down(&self, input: &PointerInput) -> Result<()> {
        {
            let mut recorder = self.lock_recorder()?;
            let Some(position) = recorder.resolve(input) else {
                return Ok(());
            };
            recorder.begin(position);
        }
        self.arm_idle_guard();
        Ok(())
    }

    pub fn on_pointer_move(&self, input: &PointerInput) -> Result<()> {
        let drew = {
            let mut recorder = self.lock_recorder()?;
            match recorder.resolve(input) {
                Some(position) => recorder.extend(position),
                None => false,
            }
        };
        if drew {
            self.arm_idle_guard();
        }
        Ok(())
    }

    pub fn on_pointer_up(&self) -> Result<()> {
        self.lock_recorder()?.end();
        Ok(())
    }

    pub fn request_clear(&self) -> Result<()> {
        self.lock_recorder()?.clear();
        self.guard.cancel();
        self.status.publish(Notice::Cleared);
        Ok(())
    }

    /// New surface size; drops the session. A save already in flight keeps
    /// its captured raster and completes.
    pub fn resize(&self, css: CssSize, device_pixel_ratio: f32) -> Result<()> {
        self.lock_recorder()?.resize(css, device_pixel_ratio);
        self.guard.cancel();
        debug!("Canvas resized to {}x{} css", css.width, css.height);
        Ok(())
    }

    pub async fn request_save(&self) -> Result<SaveOutcome> {
        if self.saving.swap(true, Ordering::SeqCst) {
            debug!("Save ignored: another save is in flight");
            return Ok(SaveOutcome::Busy);
        }
        let _in_flight = InFlight(&self.saving);

        let capture = match self.lock_recorder()?.capture() {
            Ok(capture) => capture,
            Err(FirmaError::NothingToSave) => {
                self.status.publish(Notice::NothingToSave);
                return Ok(SaveOutcome::NothingToSave);
            }
            Err(err) => return Err(err),
        };

        let image = match self.rasterizer.render(&capture, self.render_mode) {
            Ok(image) => image,
            Err(err) => {
                warn!("Rendering failed: {err}");
                let reason = self
                    .selector
                    .visible(err.diagnostic().unwrap_or(Diagnostic::EncodingFailed));
                self.status.publish(Notice::SaveFailed { reason });
                return Ok(SaveOutcome::Failed(reason));
            }
        };

        let file_name = self.namer.next();
        match self
            .selector
            .save(&image, &file_name, &self.environment)
            .await
        {
            SaveResolution::Saved {
                receipt,
                fallback_reason,
                ..
            } => {
                {
                    let mut recorder = self.lock_recorder()?;
                    if recorder.session().generation == capture.generation {
                        recorder.mark_saved();
                        self.guard.cancel();
                    } else {
                        info!("Canvas changed while saving; keeping the newer ink");
                    }
                }
                self.status.publish(Notice::Saved {
                    via: receipt.via,
                    file_name: receipt.file_name.clone(),
                    fallback_reason,
                });
                Ok(SaveOutcome::Saved(receipt))
            }
            SaveResolution::Failed { reason, .. } => {
                self.status.publish(Notice::SaveFailed { reason });
                Ok(SaveOutcome::Failed(reason))
            }
        }
    }

    pub async fn request_export_all(&self, mode: ExportMode) -> Result<ExportOutcome> {
        match self.exporter.export_all(mode).await {
            Ok(outcome) => {
                let notice = match &outcome {
                    ExportOutcome::Exported { count, archive } => Notice::Exported {
                        count: *count,
                        archive: archive.clone(),
                    },
                    ExportOutcome::NothingToExport => Notice::NothingToExport,
                    ExportOutcome::ArchiveUnavailable => Notice::ArchiveUnavailable,
                };
                self.status.publish(notice);
                Ok(outcome)
            }
            Err(err) => {
                let details = err
                    .diagnostic()
                    .map(|d| d.message().to_string())
                    .unwrap_or_else(|| err.to_string());
                self.status.publish(Notice::ExportFailed { details });
                Err(err)
            }
        }
    }

    /// Runs the configured startup archive export after its delay.
    pub fn spawn_startup_export(kiosk: Arc<Kiosk>) -> Option<JoinHandle<()>> {
        if !kiosk.bulk.export_on_start {
            return None;
        }
        let delay = Duration::from_millis(kiosk.bulk.startup_delay_ms);
        Some(tokio::spawn(async move {
            sleep(delay).await;
            if let Err(err) = kiosk.request_export_all(ExportMode::Archive).await {
                warn!("Startup export failed: {err}");
            }
        }))
    }

    fn arm_idle_guard(&self) {
        let recorder = self.recorder.clone();
        let status = self.status.clone();
        self.guard.arm(move || {
            let Ok(mut session) = recorder.lock() else {
                return;
            };
            if session.session().has_unsaved_ink() {
                session.clear();
                drop(session);
                status.publish(Notice::IdleCleared);
            }
        });
    }

    fn lock_recorder(&self) -> Result<MutexGuard<'_, StrokeRecorder>> {
        self.recorder
            .lock()
            .map_err(|_| kiosk_error("failed to lock stroke session"))
    }
}

/// Clears the in-flight flag however the save ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub fn kiosk_error(message: impl Into<String>) -> FirmaError {
    FirmaError::Ops(message.into())
}

#[cfg(test)]
mod tests;

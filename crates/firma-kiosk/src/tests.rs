use super::*;

use async_trait::async_trait;
use firma_canvas::{PngEncoder, RasterSnapshot};
use firma_storage::{
    memory::{MemoryDownloads, MemoryFolderAccess, MemoryOriginStorage, PersistenceAnswer},
    FolderAccess, FolderHandle, PermissionState,
};
use firma_types::{
    config::{DeploymentVariant, StrategyKind},
    environment::DisplayMode,
};
use tokio::sync::Notify;

struct Doubles {
    storage: Arc<MemoryOriginStorage>,
    downloads: Arc<MemoryDownloads>,
    folders: Arc<MemoryFolderAccess>,
}

impl Doubles {
    fn new() -> Self {
        Self::with_storage(MemoryOriginStorage::new())
    }

    fn with_storage(storage: MemoryOriginStorage) -> Self {
        Self {
            storage: Arc::new(storage),
            downloads: Arc::new(MemoryDownloads::new()),
            folders: Arc::new(MemoryFolderAccess::new(
                Some("/media/usb"),
                PermissionState::Granted,
            )),
        }
    }

    fn platform(&self) -> Platform {
        Platform {
            origin: Some(self.storage.clone()),
            folders: Some(self.folders.clone()),
            downloads: self.downloads.clone(),
        }
    }

    fn saved(&self) -> usize {
        self.storage.files("firmas").len()
    }
}

fn config(variant: DeploymentVariant) -> KioskConfig {
    let mut config = KioskConfig::default();
    config.canvas.width = 60.0;
    config.canvas.height = 100.0;
    config.output.width = 108;
    config.output.height = 192;
    config.persistence.variant = variant;
    config
}

fn kiosk(variant: DeploymentVariant, doubles: &Doubles, env: Environment) -> Kiosk {
    Kiosk::with_environment(&config(variant), doubles.platform(), env).expect("kiosk")
}

fn pointer(x: f32, y: f32) -> PointerInput {
    PointerInput::Pointer {
        client: Point::new(x, y),
    }
}

fn sign(kiosk: &Kiosk) {
    kiosk.on_pointer_down(&pointer(10.0, 10.0)).unwrap();
    kiosk.on_pointer_move(&pointer(30.0, 50.0)).unwrap();
    kiosk.on_pointer_move(&pointer(45.0, 80.0)).unwrap();
    kiosk.on_pointer_up().unwrap();
}

#[tokio::test]
async fn silent_save_clears_the_canvas() {
    let doubles = Doubles::new();
    let kiosk = kiosk(DeploymentVariant::Diagnosed, &doubles, Environment::capable());
    sign(&kiosk);

    let outcome = kiosk.request_save().await.unwrap();
    let SaveOutcome::Saved(receipt) = outcome else {
        panic!("expected a saved outcome, got {outcome:?}");
    };
    assert_eq!(receipt.via, StrategyKind::Silent);
    assert!(receipt.file_name.starts_with("firma_"));
    assert!(receipt.file_name.ends_with(".png"));

    let session = kiosk.session().unwrap();
    assert!(!session.dirty);
    assert!(session.saved_since_last_draw);
    assert!(session.prompt_visible);

    let files = doubles.storage.files("firmas");
    let bytes = files.get(&receipt.file_name).expect("file in collection");
    let decoded = image::load_from_memory(bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (108, 192));

    assert!(doubles.downloads.downloads().is_empty());
    let message = kiosk.status().last_notice().unwrap().message();
    assert!(message.starts_with("Guardado"), "{message}");
}

#[tokio::test]
async fn insecure_context_fails_without_writing() {
    let doubles = Doubles::new();
    let env = Environment {
        secure_context: false,
        ..Environment::capable()
    };
    let kiosk = kiosk(DeploymentVariant::SilentOnly, &doubles, env);
    sign(&kiosk);

    let outcome = kiosk.request_save().await.unwrap();
    assert_eq!(
        outcome,
        SaveOutcome::Failed(Some(Diagnostic::NotSecureContext))
    );
    assert_eq!(doubles.saved(), 0);
    assert_eq!(doubles.storage.opens(), 0);
    assert!(kiosk.session().unwrap().dirty);
    assert_eq!(
        kiosk.status().last_notice(),
        Some(Notice::SaveFailed {
            reason: Some(Diagnostic::NotSecureContext)
        })
    );
}

#[tokio::test]
async fn default_config_reports_insecure_context_without_writing() {
    let doubles = Doubles::new();
    let mut config = KioskConfig::default();
    config.output.width = 108;
    config.output.height = 192;
    assert_eq!(config.persistence.variant, DeploymentVariant::Diagnosed);
    let env = Environment {
        secure_context: false,
        ..Environment::capable()
    };
    let kiosk = Kiosk::with_environment(&config, doubles.platform(), env).unwrap();
    sign(&kiosk);

    assert_eq!(
        kiosk.request_save().await.unwrap(),
        SaveOutcome::Failed(Some(Diagnostic::NotSecureContext))
    );
    assert_eq!(doubles.saved(), 0);
    assert_eq!(doubles.storage.opens(), 0);
    assert_eq!(doubles.downloads.created(), 0);
    assert!(kiosk.session().unwrap().dirty);
    assert_eq!(
        kiosk.status().last_notice().unwrap().message(),
        Diagnostic::NotSecureContext.message()
    );
}

#[tokio::test]
async fn diagnosed_variant_names_the_private_session() {
    let doubles = Doubles::new();
    let env = Environment {
        private_session: true,
        ..Environment::capable()
    };
    let kiosk = kiosk(DeploymentVariant::Diagnosed, &doubles, env);
    sign(&kiosk);

    assert_eq!(
        kiosk.request_save().await.unwrap(),
        SaveOutcome::Failed(Some(Diagnostic::PrivateSession))
    );
    assert_eq!(doubles.storage.opens(), 0);
    assert!(doubles.downloads.downloads().is_empty());
}

#[tokio::test]
async fn fallback_variant_downloads_with_reason() {
    let doubles = Doubles::new();
    let env = Environment {
        private_session: true,
        ..Environment::capable()
    };
    let kiosk = kiosk(DeploymentVariant::SilentWithFallback, &doubles, env);
    sign(&kiosk);

    let SaveOutcome::Saved(receipt) = kiosk.request_save().await.unwrap() else {
        panic!("download fallback should succeed");
    };
    assert_eq!(receipt.via, StrategyKind::Download);
    assert_eq!(doubles.storage.opens(), 0);
    assert_eq!(doubles.downloads.downloads().len(), 1);
    assert_eq!(
        kiosk.status().last_notice(),
        Some(Notice::Saved {
            via: StrategyKind::Download,
            file_name: receipt.file_name,
            fallback_reason: Some(Diagnostic::PrivateSession),
        })
    );
}

#[tokio::test]
async fn directory_variant_writes_into_the_picked_folder() {
    let doubles = Doubles::new();
    let kiosk = kiosk(DeploymentVariant::DirectoryOnly, &doubles, Environment::capable());
    sign(&kiosk);
    let SaveOutcome::Saved(receipt) = kiosk.request_save().await.unwrap() else {
        panic!("directory save should succeed");
    };
    assert_eq!(receipt.via, StrategyKind::Directory);
    assert_eq!(
        doubles.folders.written(),
        vec![("/media/usb".to_string(), receipt.file_name.clone())]
    );
    assert_eq!(
        kiosk.status().last_notice().unwrap().message(),
        "Firma guardada ✔"
    );
}

#[tokio::test]
async fn second_save_has_nothing_to_save() {
    let doubles = Doubles::new();
    let kiosk = kiosk(DeploymentVariant::Diagnosed, &doubles, Environment::capable());
    sign(&kiosk);

    assert!(matches!(
        kiosk.request_save().await.unwrap(),
        SaveOutcome::Saved(_)
    ));
    assert_eq!(
        kiosk.request_save().await.unwrap(),
        SaveOutcome::NothingToSave
    );
    assert_eq!(doubles.saved(), 1);
    assert_eq!(kiosk.status().last_notice(), Some(Notice::NothingToSave));
}

#[tokio::test]
async fn untouched_canvas_never_reaches_a_strategy() {
    let doubles = Doubles::new();
    let kiosk = kiosk(DeploymentVariant::Diagnosed, &doubles, Environment::capable());

    assert_eq!(
        kiosk.request_save().await.unwrap(),
        SaveOutcome::NothingToSave
    );
    assert_eq!(doubles.storage.opens(), 0);
    assert_eq!(doubles.downloads.created(), 0);
    assert_eq!(doubles.folders.picks(), 0);
    assert_eq!(
        kiosk.status().last_notice().unwrap().message(),
        "Primero firme con el dedo"
    );
}

#[tokio::test]
async fn pointer_up_without_down_is_ignored() {
    let doubles = Doubles::new();
    let kiosk = kiosk(DeploymentVariant::Diagnosed, &doubles, Environment::capable());
    kiosk.on_pointer_move(&pointer(5.0, 5.0)).unwrap();
    kiosk.on_pointer_up().unwrap();
    let session = kiosk.session().unwrap();
    assert!(!session.dirty);
    assert!(!session.drawing);
}

#[tokio::test]
async fn clear_resets_the_session_and_announces_it() {
    let doubles = Doubles::new();
    let kiosk = kiosk(DeploymentVariant::Diagnosed, &doubles, Environment::capable());
    sign(&kiosk);
    kiosk.request_clear().unwrap();

    let session = kiosk.session().unwrap();
    assert!(!session.dirty);
    assert!(session.prompt_visible);
    assert_eq!(kiosk.status().last_notice(), Some(Notice::Cleared));
    assert!(kiosk.preview(6, 10).unwrap().iter().flatten().all(|ink| !ink));
}

#[tokio::test]
async fn encoding_failure_is_reported_and_nothing_written() {
    struct Refusing;
    impl PngEncoder for Refusing {
        fn name(&self) -> &'static str {
            "refusing"
        }
        fn encode(&self, _surface: &RasterSnapshot) -> Result<Option<Vec<u8>>> {
            Ok(None)
        }
    }

    let doubles = Doubles::new();
    let kiosk = kiosk(DeploymentVariant::Diagnosed, &doubles, Environment::capable())
        .with_rasterizer(Rasterizer::new(108, 192).with_encoders(vec![Box::new(Refusing)]));
    sign(&kiosk);

    assert_eq!(
        kiosk.request_save().await.unwrap(),
        SaveOutcome::Failed(Some(Diagnostic::EncodingFailed))
    );
    assert_eq!(doubles.storage.opens(), 0);
    assert_eq!(doubles.downloads.created(), 0);
    assert!(kiosk.session().unwrap().dirty);
}

#[tokio::test]
async fn quiet_variant_hides_the_reason() {
    let doubles = Doubles {
        downloads: Arc::new(MemoryDownloads::failing()),
        ..Doubles::with_storage(MemoryOriginStorage::new().with_failing_commits())
    };
    let kiosk = kiosk(
        DeploymentVariant::SilentWithFallbackQuiet,
        &doubles,
        Environment::capable(),
    );
    sign(&kiosk);

    assert_eq!(
        kiosk.request_save().await.unwrap(),
        SaveOutcome::Failed(None)
    );
    let notice = kiosk.status().last_notice().unwrap();
    assert_eq!(notice, Notice::SaveFailed { reason: None });
    assert_eq!(notice.message(), "No se pudo guardar la firma");
}

#[tokio::test]
async fn stamped_mode_composes_an_opaque_image() {
    let doubles = Doubles::new();
    let mut config = config(DeploymentVariant::SilentOnly);
    config.output.mode = RenderMode::Stamped;
    let kiosk =
        Kiosk::with_environment(&config, doubles.platform(), Environment::capable()).unwrap();
    sign(&kiosk);

    let SaveOutcome::Saved(receipt) = kiosk.request_save().await.unwrap() else {
        panic!("stamped save should succeed");
    };
    let files = doubles.storage.files("firmas");
    let decoded = image::load_from_memory(&files[&receipt.file_name])
        .unwrap()
        .to_rgba8();
    assert_eq!(decoded.dimensions(), (108, 192));
    assert!(decoded.pixels().all(|p| p[3] == 255));
}

#[tokio::test(start_paused = true)]
async fn idle_guard_clears_unsaved_ink_once() {
    let doubles = Doubles::new();
    let kiosk = kiosk(DeploymentVariant::Diagnosed, &doubles, Environment::capable());
    sign(&kiosk);

    sleep(Duration::from_secs(10)).await;
    kiosk.on_pointer_down(&pointer(20.0, 20.0)).unwrap();
    kiosk.on_pointer_move(&pointer(25.0, 30.0)).unwrap();
    kiosk.on_pointer_up().unwrap();

    // The first countdown was replaced by the later strokes.
    sleep(Duration::from_secs(10)).await;
    assert!(kiosk.session().unwrap().dirty);

    sleep(Duration::from_secs(6)).await;
    assert!(!kiosk.session().unwrap().dirty);

    sleep(Duration::from_secs(60)).await;
    let idle_clears = kiosk
        .status()
        .notices()
        .into_iter()
        .filter(|n| *n == Notice::IdleCleared)
        .count();
    assert_eq!(idle_clears, 1);
    assert_eq!(
        kiosk.status().last_notice().unwrap().message(),
        "Se limpió por inactividad"
    );
}

#[tokio::test(start_paused = true)]
async fn saved_canvas_is_not_cleared_for_idleness() {
    let doubles = Doubles::new();
    let kiosk = kiosk(DeploymentVariant::Diagnosed, &doubles, Environment::capable());
    sign(&kiosk);
    assert!(matches!(
        kiosk.request_save().await.unwrap(),
        SaveOutcome::Saved(_)
    ));

    sleep(Duration::from_secs(30)).await;
    assert!(!kiosk
        .status()
        .notices()
        .contains(&Notice::IdleCleared));
}

#[tokio::test(start_paused = true)]
async fn disabled_idle_guard_keeps_ink() {
    let doubles = Doubles::new();
    let mut config = config(DeploymentVariant::Diagnosed);
    config.idle.auto_clear_seconds = 0;
    let kiosk =
        Kiosk::with_environment(&config, doubles.platform(), Environment::capable()).unwrap();
    sign(&kiosk);
    sleep(Duration::from_secs(120)).await;
    assert!(kiosk.session().unwrap().dirty);
}

/// Folder picker that waits until the test lets it through.
struct GatedFolder {
    gate: Arc<Notify>,
    inner: MemoryFolderAccess,
}

#[async_trait]
impl FolderAccess for GatedFolder {
    async fn pick_folder(&self) -> Result<FolderHandle> {
        self.gate.notified().await;
        self.inner.pick_folder().await
    }

    async fn request_permission(&self, folder: &FolderHandle) -> Result<PermissionState> {
        self.inner.request_permission(folder).await
    }

    async fn write_file(&self, folder: &FolderHandle, file_name: &str, bytes: &[u8]) -> Result<()> {
        self.inner.write_file(folder, file_name, bytes).await
    }
}

fn gated_kiosk(doubles: &Doubles) -> (Kiosk, Arc<Notify>) {
    let gate = Arc::new(Notify::new());
    let platform = Platform {
        folders: Some(Arc::new(GatedFolder {
            gate: gate.clone(),
            inner: MemoryFolderAccess::new(Some("/media/usb"), PermissionState::Granted),
        })),
        ..doubles.platform()
    };
    let kiosk = Kiosk::with_environment(
        &config(DeploymentVariant::DirectoryOnly),
        platform,
        Environment::capable(),
    )
    .unwrap();
    (kiosk, gate)
}

#[tokio::test]
async fn overlapping_save_is_rejected_as_busy() {
    let doubles = Doubles::new();
    let (kiosk, gate) = gated_kiosk(&doubles);
    sign(&kiosk);

    let (first, second) = tokio::join!(kiosk.request_save(), async {
        tokio::task::yield_now().await;
        let outcome = kiosk.request_save().await;
        gate.notify_one();
        outcome
    });
    assert!(matches!(first.unwrap(), SaveOutcome::Saved(_)));
    assert_eq!(second.unwrap(), SaveOutcome::Busy);
}

#[tokio::test]
async fn resize_during_save_keeps_the_captured_raster() {
    let doubles = Doubles::new();
    let (kiosk, gate) = gated_kiosk(&doubles);
    sign(&kiosk);

    let (outcome, ()) = tokio::join!(kiosk.request_save(), async {
        tokio::task::yield_now().await;
        kiosk.resize(CssSize::new(80.0, 120.0), 2.0).unwrap();
        gate.notify_one();
    });
    assert!(matches!(outcome.unwrap(), SaveOutcome::Saved(_)));
    let session = kiosk.session().unwrap();
    assert!(!session.dirty);
    assert!(session.prompt_visible);
}

#[tokio::test]
async fn ink_drawn_during_save_survives_completion() {
    let doubles = Doubles::new();
    let (kiosk, gate) = gated_kiosk(&doubles);
    sign(&kiosk);

    let (outcome, ()) = tokio::join!(kiosk.request_save(), async {
        tokio::task::yield_now().await;
        kiosk.on_pointer_down(&pointer(5.0, 90.0)).unwrap();
        kiosk.on_pointer_move(&pointer(50.0, 90.0)).unwrap();
        kiosk.on_pointer_up().unwrap();
        gate.notify_one();
    });
    assert!(matches!(outcome.unwrap(), SaveOutcome::Saved(_)));
    assert!(kiosk.session().unwrap().dirty);
}

#[tokio::test]
async fn export_of_empty_collection_says_so() {
    let doubles = Doubles::new();
    let kiosk = kiosk(DeploymentVariant::Diagnosed, &doubles, Environment::capable());

    let outcome = kiosk
        .request_export_all(ExportMode::Individual)
        .await
        .unwrap();
    assert_eq!(outcome, ExportOutcome::NothingToExport);
    assert!(doubles.downloads.downloads().is_empty());
    assert_eq!(
        kiosk.status().last_notice().unwrap().message(),
        "No hay firmas guardadas"
    );
}

#[tokio::test]
async fn saved_signatures_export_byte_for_byte() {
    let doubles = Doubles::new();
    let kiosk = kiosk(DeploymentVariant::SilentOnly, &doubles, Environment::capable());
    sign(&kiosk);
    let SaveOutcome::Saved(receipt) = kiosk.request_save().await.unwrap() else {
        panic!("silent save should succeed");
    };

    let outcome = kiosk
        .request_export_all(ExportMode::Individual)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ExportOutcome::Exported {
            count: 1,
            archive: None
        }
    );
    let stored = doubles.storage.files("firmas");
    let exported = doubles.downloads.downloads();
    assert_eq!(exported.len(), 1);
    assert_eq!(exported[0].0, receipt.file_name);
    assert_eq!(exported[0].1, stored[&receipt.file_name]);
}

#[tokio::test]
async fn export_without_storage_reports_failure() {
    let doubles = Doubles::new();
    let platform = Platform {
        origin: None,
        ..doubles.platform()
    };
    let kiosk = Kiosk::with_environment(
        &config(DeploymentVariant::Diagnosed),
        platform,
        Environment::capable(),
    )
    .unwrap();

    let err = kiosk
        .request_export_all(ExportMode::Individual)
        .await
        .unwrap_err();
    assert_eq!(err.diagnostic(), Some(Diagnostic::NoStorage));
    assert!(matches!(
        kiosk.status().last_notice(),
        Some(Notice::ExportFailed { .. })
    ));
}

#[cfg(feature = "archive")]
#[tokio::test(start_paused = true)]
async fn startup_export_downloads_the_archive() {
    let doubles = Doubles::new();
    doubles
        .storage
        .insert("firmas", "firma_2024-05-01_10-00-00.png", vec![1, 2, 3]);
    let mut config = config(DeploymentVariant::Diagnosed);
    config.bulk.export_on_start = true;
    let kiosk = Arc::new(
        Kiosk::with_environment(&config, doubles.platform(), Environment::capable()).unwrap(),
    );

    let handle = Kiosk::spawn_startup_export(kiosk.clone()).expect("startup export");
    sleep(Duration::from_millis(500)).await;
    assert!(doubles.downloads.downloads().is_empty());

    handle.await.unwrap();
    let downloads = doubles.downloads.downloads();
    assert_eq!(downloads.len(), 1);
    assert_eq!(downloads[0].0, "firmas.zip");
    assert_eq!(
        kiosk.status().last_notice(),
        Some(Notice::Exported {
            count: 1,
            archive: Some("firmas.zip".into())
        })
    );
}

#[tokio::test]
async fn startup_export_is_off_by_default() {
    let doubles = Doubles::new();
    let kiosk = Arc::new(kiosk(
        DeploymentVariant::Diagnosed,
        &doubles,
        Environment::capable(),
    ));
    assert!(Kiosk::spawn_startup_export(kiosk).is_none());
}

#[tokio::test]
async fn boot_detects_private_sessions() {
    let doubles =
        Doubles::with_storage(MemoryOriginStorage::new().with_persistence(PersistenceAnswer::Denied));
    let mut config = config(DeploymentVariant::Diagnosed);
    config.environment.display_mode = DisplayMode::Pwa;

    let kiosk = Kiosk::boot(&config, doubles.platform()).await.unwrap();
    assert!(kiosk.environment().private_session);
    assert_eq!(kiosk.environment().display_mode, DisplayMode::Pwa);
    assert_eq!(kiosk.status().badge(), "PWA · incógnito");
    assert_eq!(doubles.storage.persistence_requests(), 1);
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let doubles = Doubles::new();
    let mut config = config(DeploymentVariant::Diagnosed);
    config.canvas.stroke_color = "black".into();
    let result = Kiosk::with_environment(&config, doubles.platform(), Environment::capable());
    assert!(matches!(result, Err(FirmaError::Configuration(_))));
}

#[test]
fn pointer_handlers_work_outside_a_runtime() {
    let doubles = Doubles::new();
    let kiosk = kiosk(DeploymentVariant::Diagnosed, &doubles, Environment::capable());
    sign(&kiosk);
    let session = kiosk.session().unwrap();
    assert!(session.dirty);
    assert!(!session.prompt_visible);
}

#[tokio::test]
async fn badge_names_the_configured_destination() {
    let doubles = Doubles::new();
    let download = kiosk(DeploymentVariant::DownloadOnly, &doubles, Environment::capable());
    assert_eq!(download.status().badge(), "Navegador · solo descarga");
    let folder = kiosk(DeploymentVariant::DirectoryOnly, &doubles, Environment::capable());
    assert_eq!(folder.status().badge(), "Navegador · carpeta");
    let silent = kiosk(DeploymentVariant::Diagnosed, &doubles, Environment::capable());
    assert_eq!(silent.status().badge(), "Navegador · almacenamiento privado");
}

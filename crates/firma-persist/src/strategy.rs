use std::sync::Arc;

use async_trait::async_trait;
use firma_storage::{
    download_bytes, permission_error, DownloadTarget, FolderAccess, FolderHandle, OriginStorage,
    PermissionState,
};
use firma_types::{
    config::StrategyKind,
    diagnostic::Diagnostic,
    environment::Environment,
    image::{SignatureImage, PNG_MIME},
    FirmaError, Result,
};
use tokio::{sync::Mutex, time::Duration};
use tracing::{debug, info};

/// Where a signature ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    pub via: StrategyKind,
    pub file_name: String,
    pub location: String,
}

/// One way of persisting a rendered signature.
#[async_trait]
pub trait PersistStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Reason this strategy cannot work in `env`, judged from the snapshot
    /// alone.
    fn precheck(&self, _env: &Environment) -> Option<Diagnostic> {
        None
    }

    async fn persist(
        &self,
        image: &SignatureImage,
        file_name: &str,
        env: &Environment,
    ) -> Result<SaveReceipt>;
}

/// Writes into the origin-private collection without prompting.
pub struct SilentStrategy {
    storage: Option<Arc<dyn OriginStorage>>,
    collection: String,
}

impl SilentStrategy {
    pub fn new(storage: Option<Arc<dyn OriginStorage>>, collection: impl Into<String>) -> Self {
        Self {
            storage,
            collection: collection.into(),
        }
    }
}

#[async_trait]
impl PersistStrategy for SilentStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Silent
    }

    fn precheck(&self, env: &Environment) -> Option<Diagnostic> {
        env.silent_blocker()
    }

    async fn persist(
        &self,
        image: &SignatureImage,
        file_name: &str,
        env: &Environment,
    ) -> Result<SaveReceipt> {
        if let Some(blocker) = env.silent_blocker() {
            return Err(FirmaError::Capability(blocker));
        }
        let storage = self
            .storage
            .as_ref()
            .ok_or(FirmaError::Capability(Diagnostic::NoStorage))?;
        let collection = storage.open_collection(&self.collection, true).await?;
        let mut writable = collection.create_writable(file_name).await?;
        writable.write(&image.bytes).await?;
        writable.commit().await?;
        info!(
            "Stored {file_name} in {} ({} bytes)",
            self.collection,
            image.len()
        );
        Ok(SaveReceipt {
            via: StrategyKind::Silent,
            file_name: file_name.to_string(),
            location: self.collection.clone(),
        })
    }
}

/// Writes into a folder the user picked once, asking for write permission
/// on every save.
pub struct DirectoryStrategy {
    access: Option<Arc<dyn FolderAccess>>,
    folder: Mutex<Option<FolderHandle>>,
}

impl DirectoryStrategy {
    pub fn new(access: Option<Arc<dyn FolderAccess>>) -> Self {
        Self {
            access,
            folder: Mutex::new(None),
        }
    }
}

#[async_trait]
impl PersistStrategy for DirectoryStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Directory
    }

    fn precheck(&self, _env: &Environment) -> Option<Diagnostic> {
        self.access
            .is_none()
            .then_some(Diagnostic::NoDirectoryCapability)
    }

    async fn persist(
        &self,
        image: &SignatureImage,
        file_name: &str,
        _env: &Environment,
    ) -> Result<SaveReceipt> {
        let access = self
            .access
            .as_ref()
            .ok_or(FirmaError::Capability(Diagnostic::NoDirectoryCapability))?;

        // Held across the prompt so overlapping saves never open two pickers.
        let mut cached = self.folder.lock().await;
        let folder = match cached.as_ref() {
            Some(folder) => folder.clone(),
            None => {
                let folder = access.pick_folder().await?;
                *cached = Some(folder.clone());
                folder
            }
        };
        drop(cached);

        match access.request_permission(&folder).await? {
            PermissionState::Granted => {}
            state => {
                debug!("Folder permission answered {state:?}");
                return Err(permission_error(format!(
                    "write permission not granted for {}",
                    folder.location
                )));
            }
        }
        access.write_file(&folder, file_name, &image.bytes).await?;
        info!("Wrote {file_name} into {}", folder.location);
        Ok(SaveReceipt {
            via: StrategyKind::Directory,
            file_name: file_name.to_string(),
            location: folder.location,
        })
    }
}

/// Hands the image to the download shelf; always available.
pub struct DownloadStrategy {
    target: Arc<dyn DownloadTarget>,
    release_after: Duration,
}

impl DownloadStrategy {
    pub fn new(target: Arc<dyn DownloadTarget>, release_after: Duration) -> Self {
        Self {
            target,
            release_after,
        }
    }
}

#[async_trait]
impl PersistStrategy for DownloadStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Download
    }

    async fn persist(
        &self,
        image: &SignatureImage,
        file_name: &str,
        _env: &Environment,
    ) -> Result<SaveReceipt> {
        download_bytes(
            self.target.clone(),
            image.bytes.clone(),
            PNG_MIME,
            file_name,
            self.release_after,
        )
        .await?;
        Ok(SaveReceipt {
            via: StrategyKind::Download,
            file_name: file_name.to_string(),
            location: "downloads".into(),
        })
    }
}

//! Platform storage seams: origin-private collections, user-picked folders
//! and the browser-style download shelf.

pub mod download;
pub mod folder;
pub mod memory;
pub mod origin;

use std::sync::Arc;

use async_trait::async_trait;
use firma_types::{
    environment::{DisplayMode, Environment},
    FirmaError, Result,
};
use tracing::{info, warn};

pub use download::{download_bytes, schedule_revoke, FsDownloadTarget, ObjectUrl};
pub use folder::FsFolderAccess;
pub use origin::FsOriginStorage;

/// Origin-scoped storage the user cannot browse directly.
#[async_trait]
pub trait OriginStorage: Send + Sync {
    /// Asks for durable storage. `Ok(false)` or an error mean the data may
    /// vanish with the session, which is how private browsing shows up.
    async fn request_persistence(&self) -> Result<bool>;

    /// Opens a named collection, creating it empty when `create` is set.
    async fn open_collection(&self, name: &str, create: bool) -> Result<Arc<dyn Collection>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// Flat set of named files inside an [`OriginStorage`].
#[async_trait]
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    /// Creates (or truncates on commit) the named file and opens it for
    /// writing. Nothing is visible to readers until the commit.
    async fn create_writable(&self, file_name: &str) -> Result<Box<dyn WritableFile>>;

    /// Entries sorted by name.
    async fn entries(&self) -> Result<Vec<CollectionEntry>>;

    async fn read(&self, file_name: &str) -> Result<Vec<u8>>;
}

#[async_trait]
pub trait WritableFile: Send {
    async fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Publishes the written bytes atomically.
    async fn commit(self: Box<Self>) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
    Prompt,
}

/// Folder the user picked, kept for the rest of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderHandle {
    pub location: String,
}

/// Directory picker plus read-write permission prompts.
#[async_trait]
pub trait FolderAccess: Send + Sync {
    /// Shows the picker. Dismissal is a permission error.
    async fn pick_folder(&self) -> Result<FolderHandle>;

    async fn request_permission(&self, folder: &FolderHandle) -> Result<PermissionState>;

    async fn write_file(&self, folder: &FolderHandle, file_name: &str, bytes: &[u8]) -> Result<()>;
}

/// Temporary object URLs and user-visible downloads.
#[async_trait]
pub trait DownloadTarget: Send + Sync {
    fn create_object_url(&self, bytes: Vec<u8>, mime: &str) -> Result<ObjectUrl>;

    /// Saves the object under `file_name` the way a clicked download link
    /// would.
    async fn trigger(&self, url: &ObjectUrl, file_name: &str) -> Result<()>;

    fn revoke(&self, url: &ObjectUrl);
}

/// Computes the capability snapshot once at startup.
pub async fn detect_environment(
    secure_context: bool,
    display_mode: DisplayMode,
    origin: Option<&dyn OriginStorage>,
) -> Environment {
    let storage_available = secure_context && origin.is_some();
    let private_session = match origin {
        Some(storage) if storage_available => match storage.request_persistence().await {
            Ok(true) => false,
            Ok(false) => {
                info!("Persistent storage denied; treating session as private");
                true
            }
            Err(err) => {
                warn!("Persistent storage request failed ({err}); treating session as private");
                true
            }
        },
        _ => false,
    };
    let environment = Environment {
        secure_context,
        storage_available,
        private_session,
        display_mode,
    };
    info!(
        "Environment: secure={} storage={} private={}",
        environment.secure_context, environment.storage_available, environment.private_session
    );
    environment
}

pub fn storage_error(message: impl Into<String>) -> FirmaError {
    FirmaError::Persistence(message.into())
}

pub fn permission_error(message: impl Into<String>) -> FirmaError {
    FirmaError::Permission(message.into())
}

/// Collection and file names must stay inside their parent.
pub fn ensure_plain_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if bad {
        Err(storage_error(format!("invalid entry name {name:?}")))
    } else {
        Ok(())
    }
}

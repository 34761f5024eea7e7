use std::{path::PathBuf, sync::Arc};

use firma_storage::{
    DownloadTarget, FolderAccess, FsDownloadTarget, FsFolderAccess, FsOriginStorage,
    OriginStorage,
};
use firma_types::config::PersistenceConfig;

/// The platform services the kiosk talks to. `None` marks a capability the
/// host does not offer.
#[derive(Clone)]
pub struct Platform {
    pub origin: Option<Arc<dyn OriginStorage>>,
    pub folders: Option<Arc<dyn FolderAccess>>,
    pub downloads: Arc<dyn DownloadTarget>,
}

impl Platform {
    /// Filesystem-backed services laid out as the configuration describes.
    pub fn from_config(config: &PersistenceConfig) -> Self {
        let origin = config
            .origin_root
            .as_ref()
            .map(|root| Arc::new(FsOriginStorage::new(root)) as Arc<dyn OriginStorage>);
        let folders: Arc<dyn FolderAccess> =
            Arc::new(FsFolderAccess::new(config.folder.as_ref().map(PathBuf::from)));
        Self {
            origin,
            folders: Some(folders),
            downloads: Arc::new(FsDownloadTarget::new(&config.download_dir)),
        }
    }
}

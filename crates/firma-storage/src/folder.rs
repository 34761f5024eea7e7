use std::path::PathBuf;

use async_trait::async_trait;
use firma_types::Result;
use tokio::fs;
use tracing::info;

use crate::{
    ensure_plain_name, origin::write_atomically, permission_error, FolderAccess, FolderHandle,
    PermissionState,
};

/// Directory "picker" answered by the operator's configuration: the
/// configured folder is what the user would choose, no folder means the
/// prompt was dismissed.
pub struct FsFolderAccess {
    preset: Option<PathBuf>,
}

impl FsFolderAccess {
    pub fn new(preset: Option<PathBuf>) -> Self {
        Self { preset }
    }
}

#[async_trait]
impl FolderAccess for FsFolderAccess {
    async fn pick_folder(&self) -> Result<FolderHandle> {
        let Some(path) = &self.preset else {
            return Err(permission_error("folder prompt dismissed"));
        };
        if !fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Err(permission_error(format!(
                "{} is not an accessible folder",
                path.display()
            )));
        }
        info!("Folder picked: {}", path.display());
        Ok(FolderHandle {
            location: path.to_string_lossy().into_owned(),
        })
    }

    async fn request_permission(&self, folder: &FolderHandle) -> Result<PermissionState> {
        match fs::metadata(&folder.location).await {
            Ok(meta) if meta.is_dir() && !meta.permissions().readonly() => {
                Ok(PermissionState::Granted)
            }
            Ok(_) => Ok(PermissionState::Denied),
            Err(err) => {
                info!("Folder {} unavailable: {err}", folder.location);
                Ok(PermissionState::Denied)
            }
        }
    }

    async fn write_file(&self, folder: &FolderHandle, file_name: &str, bytes: &[u8]) -> Result<()> {
        ensure_plain_name(file_name)?;
        let dir = PathBuf::from(&folder.location);
        let swap = dir.join(format!(".{file_name}.crswap"));
        write_atomically(&swap, &dir.join(file_name), bytes).await
    }
}

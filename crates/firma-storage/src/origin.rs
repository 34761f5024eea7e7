use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use firma_types::Result;
use tokio::fs;
use tracing::{debug, info};

use crate::{
    ensure_plain_name, storage_error, Collection, CollectionEntry, EntryKind, OriginStorage,
    WritableFile,
};

const PERSIST_MARKER: &str = ".persisted";
const SWAP_SUFFIX: &str = ".crswap";

/// Origin-private storage rooted at a directory only the kiosk uses.
pub struct FsOriginStorage {
    root: PathBuf,
}

impl FsOriginStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl OriginStorage for FsOriginStorage {
    async fn request_persistence(&self) -> Result<bool> {
        fs::create_dir_all(&self.root).await.map_err(|err| {
            storage_error(format!("cannot create {}: {err}", self.root.display()))
        })?;
        let marker = self.root.join(PERSIST_MARKER);
        match fs::write(&marker, b"1").await {
            Ok(()) => Ok(true),
            Err(err) => {
                info!("Persistence marker not writable at {}: {err}", marker.display());
                Ok(false)
            }
        }
    }

    async fn open_collection(&self, name: &str, create: bool) -> Result<Arc<dyn Collection>> {
        ensure_plain_name(name)?;
        let dir = self.root.join(name);
        if create {
            fs::create_dir_all(&dir).await.map_err(|err| {
                storage_error(format!("cannot create collection {}: {err}", dir.display()))
            })?;
        } else if !fs::try_exists(&dir).await.unwrap_or(false) {
            return Err(storage_error(format!("collection {name} not found")));
        }
        Ok(Arc::new(FsCollection {
            name: name.to_string(),
            dir,
        }))
    }
}

struct FsCollection {
    name: String,
    dir: PathBuf,
}

#[async_trait]
impl Collection for FsCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_writable(&self, file_name: &str) -> Result<Box<dyn WritableFile>> {
        ensure_plain_name(file_name)?;
        let target = self.dir.join(file_name);
        let swap = self.dir.join(format!(".{file_name}{SWAP_SUFFIX}"));
        fs::File::create(&swap)
            .await
            .map_err(|err| storage_error(format!("cannot open {}: {err}", swap.display())))?;
        Ok(Box::new(FsWritable {
            target,
            swap,
            buffer: Vec::new(),
        }))
    }

    async fn entries(&self) -> Result<Vec<CollectionEntry>> {
        let mut reader = fs::read_dir(&self.dir)
            .await
            .map_err(|err| storage_error(format!("cannot list {}: {err}", self.dir.display())))?;
        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|err| storage_error(format!("cannot list {}: {err}", self.dir.display())))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let file_type = entry
                .file_type()
                .await
                .map_err(|err| storage_error(format!("cannot stat {name}: {err}")))?;
            let kind = if file_type.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            entries.push(CollectionEntry { name, kind });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn read(&self, file_name: &str) -> Result<Vec<u8>> {
        ensure_plain_name(file_name)?;
        let path = self.dir.join(file_name);
        fs::read(&path)
            .await
            .map_err(|err| storage_error(format!("cannot read {}: {err}", path.display())))
    }
}

/// Bytes go to a hidden swap file; commit renames it over the target.
struct FsWritable {
    target: PathBuf,
    swap: PathBuf,
    buffer: Vec<u8>,
}

#[async_trait]
impl WritableFile for FsWritable {
    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        write_atomically(&self.swap, &self.target, &self.buffer).await?;
        debug!("Committed {} ({} bytes)", self.target.display(), self.buffer.len());
        Ok(())
    }
}

/// Writes `bytes` to `swap`, then renames it to `target` so readers only
/// ever see a complete file.
pub(crate) async fn write_atomically(swap: &Path, target: &Path, bytes: &[u8]) -> Result<()> {
    if let Err(err) = fs::write(swap, bytes).await {
        let _ = fs::remove_file(swap).await;
        return Err(storage_error(format!("cannot write {}: {err}", swap.display())));
    }
    if let Err(err) = fs::rename(swap, target).await {
        let _ = fs::remove_file(swap).await;
        return Err(storage_error(format!(
            "cannot commit {}: {err}",
            target.display()
        )));
    }
    Ok(())
}

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use firma_types::Result;
use tokio::{
    fs,
    task::JoinHandle,
    time::{sleep, Duration},
};
use tracing::{debug, info};

use crate::{ensure_plain_name, origin::write_atomically, storage_error, DownloadTarget};

/// Handle to a temporary in-memory object, valid until revoked.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUrl(pub String);

/// Creates a temporary object for `bytes`, downloads it as `file_name` and
/// releases the object `release_after` later. The returned task finishes once
/// the object has been released.
pub async fn download_bytes(
    target: Arc<dyn DownloadTarget>,
    bytes: Vec<u8>,
    mime: &str,
    file_name: &str,
    release_after: Duration,
) -> Result<JoinHandle<()>> {
    let url = target.create_object_url(bytes, mime)?;
    if let Err(err) = target.trigger(&url, file_name).await {
        target.revoke(&url);
        return Err(err);
    }
    Ok(schedule_revoke(target, url, release_after))
}

/// Releases `url` after `delay`, leaving the platform time to read it.
pub fn schedule_revoke(
    target: Arc<dyn DownloadTarget>,
    url: ObjectUrl,
    delay: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        sleep(delay).await;
        target.revoke(&url);
        debug!("Released {}", url.0);
    })
}

/// Download shelf backed by a directory, naming duplicates `name (1).png`
/// like a browser does.
pub struct FsDownloadTarget {
    dir: PathBuf,
    next_id: AtomicU64,
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl FsDownloadTarget {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            next_id: AtomicU64::new(0),
            objects: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn live_objects(&self) -> usize {
        self.objects.lock().map(|o| o.len()).unwrap_or_default()
    }

    async fn free_path(&self, file_name: &str) -> PathBuf {
        let candidate = self.dir.join(file_name);
        if !fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
        let (stem, extension) = match file_name.rsplit_once('.') {
            Some((stem, ext)) => (stem, format!(".{ext}")),
            None => (file_name, String::new()),
        };
        let mut copy = 1;
        loop {
            let candidate = self.dir.join(format!("{stem} ({copy}){extension}"));
            if !fs::try_exists(&candidate).await.unwrap_or(false) {
                return candidate;
            }
            copy += 1;
        }
    }
}

#[async_trait]
impl DownloadTarget for FsDownloadTarget {
    fn create_object_url(&self, bytes: Vec<u8>, _mime: &str) -> Result<ObjectUrl> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let url = ObjectUrl(format!("blob:firma/{id}"));
        self.objects
            .lock()
            .map_err(|_| storage_error("failed to lock download objects"))?
            .insert(url.0.clone(), bytes);
        Ok(url)
    }

    async fn trigger(&self, url: &ObjectUrl, file_name: &str) -> Result<()> {
        ensure_plain_name(file_name)?;
        let bytes = self
            .objects
            .lock()
            .map_err(|_| storage_error("failed to lock download objects"))?
            .get(&url.0)
            .cloned()
            .ok_or_else(|| storage_error(format!("{} was already revoked", url.0)))?;
        fs::create_dir_all(&self.dir).await.map_err(|err| {
            storage_error(format!("cannot create {}: {err}", self.dir.display()))
        })?;
        let path = self.free_path(file_name).await;
        let swap = self.dir.join(format!(".{file_name}.part"));
        write_atomically(&swap, &path, &bytes).await?;
        info!("Downloaded {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    fn revoke(&self, url: &ObjectUrl) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.remove(&url.0);
        }
    }
}

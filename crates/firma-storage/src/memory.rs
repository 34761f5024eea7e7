//! In-process platform doubles for tests and dry runs.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use firma_types::Result;
use tracing::info;

use crate::{
    ensure_plain_name, permission_error, storage_error, Collection, CollectionEntry,
    DownloadTarget, EntryKind, FolderAccess, FolderHandle, ObjectUrl, OriginStorage,
    PermissionState, WritableFile,
};

type Files = Arc<Mutex<BTreeMap<String, Vec<u8>>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceAnswer {
    Granted,
    Denied,
    Fails,
}

/// Origin storage held entirely in memory.
pub struct MemoryOriginStorage {
    collections: Mutex<HashMap<String, Files>>,
    persistence: PersistenceAnswer,
    fail_commits: bool,
    persistence_requests: AtomicUsize,
    opens: AtomicUsize,
}

impl MemoryOriginStorage {
    pub fn new() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            persistence: PersistenceAnswer::Granted,
            fail_commits: false,
            persistence_requests: AtomicUsize::new(0),
            opens: AtomicUsize::new(0),
        }
    }

    pub fn with_persistence(mut self, answer: PersistenceAnswer) -> Self {
        self.persistence = answer;
        self
    }

    /// Every commit fails, as when the quota is exhausted.
    pub fn with_failing_commits(mut self) -> Self {
        self.fail_commits = true;
        self
    }

    pub fn persistence_requests(&self) -> usize {
        self.persistence_requests.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.collections
            .lock()
            .map(|c| c.contains_key(name))
            .unwrap_or(false)
    }

    /// Copy of a collection's committed files.
    pub fn files(&self, collection: &str) -> BTreeMap<String, Vec<u8>> {
        self.collections
            .lock()
            .ok()
            .and_then(|c| c.get(collection).cloned())
            .and_then(|files| files.lock().ok().map(|f| f.clone()))
            .unwrap_or_default()
    }

    pub fn insert(&self, collection: &str, name: &str, bytes: Vec<u8>) {
        if let Ok(mut collections) = self.collections.lock() {
            let files = collections.entry(collection.to_string()).or_default();
            if let Ok(mut files) = files.lock() {
                files.insert(name.to_string(), bytes);
            }
        }
    }
}

impl Default for MemoryOriginStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OriginStorage for MemoryOriginStorage {
    async fn request_persistence(&self) -> Result<bool> {
        self.persistence_requests.fetch_add(1, Ordering::SeqCst);
        match self.persistence {
            PersistenceAnswer::Granted => Ok(true),
            PersistenceAnswer::Denied => Ok(false),
            PersistenceAnswer::Fails => Err(storage_error("persist() rejected")),
        }
    }

    async fn open_collection(&self, name: &str, create: bool) -> Result<Arc<dyn Collection>> {
        ensure_plain_name(name)?;
        self.opens.fetch_add(1, Ordering::SeqCst);
        let mut collections = self
            .collections
            .lock()
            .map_err(|_| storage_error("failed to lock collections"))?;
        let files = match collections.get(name) {
            Some(files) => files.clone(),
            None if create => collections.entry(name.to_string()).or_default().clone(),
            None => return Err(storage_error(format!("collection {name} not found"))),
        };
        Ok(Arc::new(MemoryCollection {
            name: name.to_string(),
            files,
            fail_commits: self.fail_commits,
        }))
    }
}

struct MemoryCollection {
    name: String,
    files: Files,
    fail_commits: bool,
}

#[async_trait]
impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_writable(&self, file_name: &str) -> Result<Box<dyn WritableFile>> {
        ensure_plain_name(file_name)?;
        Ok(Box::new(MemoryWritable {
            name: file_name.to_string(),
            files: self.files.clone(),
            buffer: Vec::new(),
            fail_commit: self.fail_commits,
        }))
    }

    async fn entries(&self) -> Result<Vec<CollectionEntry>> {
        let files = self
            .files
            .lock()
            .map_err(|_| storage_error("failed to lock collection"))?;
        Ok(files
            .keys()
            .map(|name| CollectionEntry {
                name: name.clone(),
                kind: EntryKind::File,
            })
            .collect())
    }

    async fn read(&self, file_name: &str) -> Result<Vec<u8>> {
        let files = self
            .files
            .lock()
            .map_err(|_| storage_error("failed to lock collection"))?;
        files
            .get(file_name)
            .cloned()
            .ok_or_else(|| storage_error(format!("{file_name} not found in {}", self.name)))
    }
}

struct MemoryWritable {
    name: String,
    files: Files,
    buffer: Vec<u8>,
    fail_commit: bool,
}

#[async_trait]
impl WritableFile for MemoryWritable {
    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        if self.fail_commit {
            return Err(storage_error("quota exceeded"));
        }
        let mut files = self
            .files
            .lock()
            .map_err(|_| storage_error("failed to lock collection"))?;
        files.insert(self.name, self.buffer);
        Ok(())
    }
}

/// Scripted directory picker.
pub struct MemoryFolderAccess {
    pick: Option<String>,
    permission: PermissionState,
    picks: AtomicUsize,
    permission_requests: AtomicUsize,
    files: Mutex<BTreeMap<(String, String), Vec<u8>>>,
}

impl MemoryFolderAccess {
    /// `pick` is the folder the user chooses; `None` dismisses the prompt.
    pub fn new(pick: Option<&str>, permission: PermissionState) -> Self {
        Self {
            pick: pick.map(str::to_string),
            permission,
            picks: AtomicUsize::new(0),
            permission_requests: AtomicUsize::new(0),
            files: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn picks(&self) -> usize {
        self.picks.load(Ordering::SeqCst)
    }

    pub fn permission_requests(&self) -> usize {
        self.permission_requests.load(Ordering::SeqCst)
    }

    pub fn written(&self) -> Vec<(String, String)> {
        self.files
            .lock()
            .map(|f| f.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl FolderAccess for MemoryFolderAccess {
    async fn pick_folder(&self) -> Result<FolderHandle> {
        self.picks.fetch_add(1, Ordering::SeqCst);
        self.pick
            .clone()
            .map(|location| FolderHandle { location })
            .ok_or_else(|| permission_error("folder prompt dismissed"))
    }

    async fn request_permission(&self, _folder: &FolderHandle) -> Result<PermissionState> {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.permission)
    }

    async fn write_file(&self, folder: &FolderHandle, file_name: &str, bytes: &[u8]) -> Result<()> {
        ensure_plain_name(file_name)?;
        let mut files = self
            .files
            .lock()
            .map_err(|_| storage_error("failed to lock folder"))?;
        files.insert(
            (folder.location.clone(), file_name.to_string()),
            bytes.to_vec(),
        );
        Ok(())
    }
}

/// Download shelf that remembers everything it was handed.
#[derive(Default)]
pub struct MemoryDownloads {
    next_id: AtomicU64,
    objects: Mutex<HashMap<String, Vec<u8>>>,
    downloads: Mutex<Vec<(String, Vec<u8>)>>,
    created: AtomicUsize,
    revoked: AtomicUsize,
    failing: bool,
}

impl MemoryDownloads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every trigger fails, as when downloads are blocked by policy.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn downloads(&self) -> Vec<(String, Vec<u8>)> {
        self.downloads.lock().map(|d| d.clone()).unwrap_or_default()
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn revoked(&self) -> usize {
        self.revoked.load(Ordering::SeqCst)
    }

    pub fn live_objects(&self) -> usize {
        self.objects.lock().map(|o| o.len()).unwrap_or_default()
    }
}

#[async_trait]
impl DownloadTarget for MemoryDownloads {
    fn create_object_url(&self, bytes: Vec<u8>, _mime: &str) -> Result<ObjectUrl> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let url = ObjectUrl(format!("blob:memory/{id}"));
        self.objects
            .lock()
            .map_err(|_| storage_error("failed to lock objects"))?
            .insert(url.0.clone(), bytes);
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(url)
    }

    async fn trigger(&self, url: &ObjectUrl, file_name: &str) -> Result<()> {
        if self.failing {
            return Err(storage_error("downloads are blocked"));
        }
        let bytes = self
            .objects
            .lock()
            .map_err(|_| storage_error("failed to lock objects"))?
            .get(&url.0)
            .cloned()
            .ok_or_else(|| storage_error(format!("{} was already revoked", url.0)))?;
        info!("Memory download {file_name} ({} bytes)", bytes.len());
        self.downloads
            .lock()
            .map_err(|_| storage_error("failed to lock downloads"))?
            .push((file_name.to_string(), bytes));
        Ok(())
    }

    fn revoke(&self, url: &ObjectUrl) {
        if let Ok(mut objects) = self.objects.lock() {
            if objects.remove(&url.0).is_some() {
                self.revoked.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

use std::sync::Arc;

use firma_storage::{schedule_revoke, DownloadTarget, EntryKind, OriginStorage};
use firma_types::{
    config::BulkConfig,
    diagnostic::Diagnostic,
    image::PNG_MIME,
    FirmaError, Result,
};
use tokio::time::Duration;
use tracing::{debug, info};

#[cfg(feature = "archive")]
use crate::export_error;

#[cfg(feature = "archive")]
const ZIP_MIME: &str = "application/zip";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportMode {
    /// One download per stored signature.
    #[default]
    Individual,
    /// Everything in a single ZIP.
    Archive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Exported {
        count: usize,
        archive: Option<String>,
    },
    NothingToExport,
    ArchiveUnavailable,
}

/// Reads back everything the silent strategy stored.
pub struct BulkExporter {
    storage: Option<Arc<dyn OriginStorage>>,
    downloads: Arc<dyn DownloadTarget>,
    collection: String,
    archive_name: String,
    stagger: Duration,
    release_after: Duration,
}

impl BulkExporter {
    pub fn new(
        storage: Option<Arc<dyn OriginStorage>>,
        downloads: Arc<dyn DownloadTarget>,
        collection: impl Into<String>,
    ) -> Self {
        let defaults = BulkConfig::default();
        Self {
            storage,
            downloads,
            collection: collection.into(),
            archive_name: defaults.archive_name,
            stagger: Duration::from_millis(defaults.stagger_ms),
            release_after: Duration::from_millis(1500),
        }
    }

    pub fn with_config(mut self, config: &BulkConfig, release_after: Duration) -> Self {
        self.archive_name = config.archive_name.clone();
        self.stagger = Duration::from_millis(config.stagger_ms);
        self.release_after = release_after;
        self
    }

    pub fn archive_supported() -> bool {
        cfg!(feature = "archive")
    }

    pub async fn export_all(&self, mode: ExportMode) -> Result<ExportOutcome> {
        if mode == ExportMode::Archive && !Self::archive_supported() {
            info!("Archive export requested but ZIP support is not built in");
            return Ok(ExportOutcome::ArchiveUnavailable);
        }
        let storage = self
            .storage
            .as_ref()
            .ok_or(FirmaError::Capability(Diagnostic::NoStorage))?;
        let collection = storage.open_collection(&self.collection, true).await?;

        let mut files = Vec::new();
        for entry in collection.entries().await? {
            if entry.kind != EntryKind::File {
                continue;
            }
            let bytes = collection.read(&entry.name).await?;
            files.push((entry.name, bytes));
        }
        if files.is_empty() {
            info!("Collection {} is empty; nothing to export", self.collection);
            return Ok(ExportOutcome::NothingToExport);
        }

        match mode {
            ExportMode::Individual => self.download_each(files).await,
            ExportMode::Archive => self.download_archive(files).await,
        }
    }

    async fn download_each(&self, files: Vec<(String, Vec<u8>)>) -> Result<ExportOutcome> {
        let count = files.len();
        for (index, (name, bytes)) in files.into_iter().enumerate() {
            let url = self.downloads.create_object_url(bytes, PNG_MIME)?;
            if let Err(err) = self.downloads.trigger(&url, &name).await {
                self.downloads.revoke(&url);
                return Err(err);
            }
            let delay = self.release_after + self.stagger * index as u32;
            schedule_revoke(self.downloads.clone(), url, delay);
            debug!("Exported {name}");
        }
        info!("Exported {count} signatures individually");
        Ok(ExportOutcome::Exported {
            count,
            archive: None,
        })
    }

    #[cfg(feature = "archive")]
    async fn download_archive(&self, files: Vec<(String, Vec<u8>)>) -> Result<ExportOutcome> {
        let count = files.len();
        let archive = zip_files(&files)?;
        let url = self.downloads.create_object_url(archive, ZIP_MIME)?;
        if let Err(err) = self.downloads.trigger(&url, &self.archive_name).await {
            self.downloads.revoke(&url);
            return Err(err);
        }
        schedule_revoke(self.downloads.clone(), url, self.release_after);
        info!("Exported {count} signatures as {}", self.archive_name);
        Ok(ExportOutcome::Exported {
            count,
            archive: Some(self.archive_name.clone()),
        })
    }

    #[cfg(not(feature = "archive"))]
    async fn download_archive(&self, _files: Vec<(String, Vec<u8>)>) -> Result<ExportOutcome> {
        Ok(ExportOutcome::ArchiveUnavailable)
    }
}

/// PNGs are already compressed, so entries are stored as-is.
#[cfg(feature = "archive")]
fn zip_files(files: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    use std::io::{Cursor, Write};
    use zip::{write::FileOptions, CompressionMethod, ZipWriter};

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, bytes) in files {
        writer
            .start_file(name.as_str(), options)
            .map_err(|err| export_error(format!("cannot add {name} to archive: {err}")))?;
        writer
            .write_all(bytes)
            .map_err(|err| export_error(format!("cannot add {name} to archive: {err}")))?;
    }
    let cursor = writer
        .finish()
        .map_err(|err| export_error(format!("cannot finish archive: {err}")))?;
    Ok(cursor.into_inner())
}

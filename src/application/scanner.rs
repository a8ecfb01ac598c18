use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::domain::{classify, MediaFile, MediaKind, ScanOrder};

/// Lists classified media files in the storage directory.
///
/// Every call re-reads the directory; nothing is cached.
#[derive(Debug, Clone)]
pub struct Scanner {
    directory: PathBuf,
    kinds: Vec<MediaKind>,
}

impl Scanner {
    pub fn new(directory: impl Into<PathBuf>, kinds: Vec<MediaKind>) -> Self {
        Self {
            directory: directory.into(),
            kinds,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Never fails: an absent or unreadable directory scans as empty.
    pub fn scan(&self, order: ScanOrder) -> Vec<MediaFile> {
        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot list {}: {}", self.directory.display(), e);
                return Vec::new();
            }
        };

        let mut files: Vec<MediaFile> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let metadata = entry.metadata().ok()?;
                if !metadata.is_file() {
                    return None;
                }
                let name = entry.file_name();
                let kind = classify(name.to_str()?).kind?;
                if !self.kinds.contains(&kind) {
                    return None;
                }
                Some(MediaFile {
                    path: entry.path(),
                    kind,
                    modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                })
            })
            .collect();

        match order {
            ScanOrder::NewestFirst => files.sort_by(|a, b| {
                b.modified.cmp(&a.modified).then_with(|| a.path.cmp(&b.path))
            }),
            ScanOrder::ByPath => files.sort_by(|a, b| a.path.cmp(&b.path)),
        }

        debug!(
            "Scanned {}: {} media files",
            self.directory.display(),
            files.len()
        );
        files
    }

    /// Files of one kind, in the given order.
    pub fn scan_kind(&self, kind: MediaKind, order: ScanOrder) -> Vec<MediaFile> {
        self.scan(order)
            .into_iter()
            .filter(|file| file.kind == kind)
            .collect()
    }

    /// Most recently modified file of `kind`.
    pub fn latest(&self, kind: MediaKind) -> Option<MediaFile> {
        self.scan_kind(kind, ScanOrder::NewestFirst).into_iter().next()
    }

    /// Playback list for `kind`: absolute paths in path order.
    pub fn playlist(&self, kind: MediaKind) -> Vec<PathBuf> {
        self.scan_kind(kind, ScanOrder::ByPath)
            .into_iter()
            .map(|file| file.path)
            .collect()
    }
}

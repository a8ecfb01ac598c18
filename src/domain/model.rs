use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Image,
}

impl MediaKind {
    /// Extension appended when a destination name is forced to this kind.
    pub fn canonical_extension(self) -> &'static str {
        match self {
            MediaKind::Video => "mp4",
            MediaKind::Image => "jpg",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MediaKind::Video => "Video",
            MediaKind::Image => "Image",
        }
    }
}

/// A media file found in the storage directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub path: PathBuf,
    pub kind: MediaKind,
    pub modified: SystemTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub url: String,
    pub index: usize,
}

/// Ordering applied to a directory scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrder {
    /// Most recently modified first; picks the "latest" file.
    NewestFirst,
    /// Lexicographic path order; builds a deterministic playlist.
    ByPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    Idle,
    Preparing,
    Downloading,
    Succeeded,
    Failed,
    Completed,
}

impl BatchPhase {
    pub fn is_in_flight(self) -> bool {
        matches!(self, BatchPhase::Preparing | BatchPhase::Downloading)
    }
}

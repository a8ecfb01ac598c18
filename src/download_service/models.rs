use std::fmt;
use std::path::PathBuf;

/// Opaque identifier handed out by a download service on submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DownloadId(pub u64);

impl fmt::Display for DownloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Reason code attached to a failed download.
///
/// HTTP failures carry the response status code; local failures use the
/// codes below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FailureReason(pub u32);

impl FailureReason {
    pub const UNKNOWN: FailureReason = FailureReason(1000);
    pub const FILE_ERROR: FailureReason = FailureReason(1001);
    pub const HTTP_DATA_ERROR: FailureReason = FailureReason(1004);
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    Pending,
    Running,
    Paused(u32),
    Succeeded,
    Failed(FailureReason),
}

impl DownloadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadStatus::Succeeded | DownloadStatus::Failed(_))
    }
}

/// Point-in-time view of one download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadSnapshot {
    pub status: DownloadStatus,
    pub bytes_downloaded: u64,
    pub bytes_total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub destination: PathBuf,
    pub title: String,
    pub description: String,
    pub mime_type: String,
    pub allow_over_metered: bool,
    pub allow_over_roaming: bool,
}

pub mod http;
pub mod models;

use thiserror::Error;
use tokio::sync::broadcast;

pub use http::HttpDownloadService;
pub use models::{DownloadId, DownloadRequest, DownloadSnapshot, DownloadStatus, FailureReason};

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Invalid download URL {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Destination unavailable: {0}")]
    Destination(#[from] std::io::Error),

    #[error("Download service unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, DownloadError>;

/// A download queue that transfers files out of band.
///
/// Submission is fire-and-forget; progress is only observable through
/// [`DownloadService::query`] and the completion broadcast.
pub trait DownloadService {
    fn enqueue(&self, request: DownloadRequest) -> Result<DownloadId>;

    /// `Ok(None)` when the service has no record for `id` (yet).
    fn query(&self, id: DownloadId) -> Result<Option<DownloadSnapshot>>;

    /// Broadcast of ids whose download reached a terminal state.
    fn subscribe_completions(&self) -> broadcast::Receiver<DownloadId>;

    /// Forget `id`, aborting its transfer if still running.
    fn remove(&self, id: DownloadId);
}

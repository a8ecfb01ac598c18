use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("Could not submit download {index} of {total}: {message}")]
    Submission {
        index: usize,
        total: usize,
        message: String,
    },

    #[error("Download failed on {index}/{total} (reason {reason})")]
    DownloadFailed {
        index: usize,
        total: usize,
        reason: u32,
    },
}

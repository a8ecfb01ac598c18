pub mod classifier;
pub mod error;
pub mod model;

pub use classifier::classify;
pub use error::AppError;
pub use model::{BatchPhase, DownloadJob, MediaFile, MediaKind, ScanOrder};
